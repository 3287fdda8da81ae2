use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rand::Rng;
use rand::distributions::Alphanumeric;
use rand::seq::SliceRandom;
use rand::thread_rng;

use crate::entropy::uuid_from_bytes;
use crate::error::TemplateError;
use crate::user_agent::USER_AGENTS;

/// Largest length accepted by the sized generators.
const MAX_GENERATED_LEN: usize = 1 << 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Arity {
    Exact(usize),
    AtLeast(usize),
}

impl Arity {
    pub(super) const fn accepts(self, count: usize) -> bool {
        match self {
            Arity::Exact(expected) => count == expected,
            Arity::AtLeast(min) => count >= min,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exact(expected) => write!(f, "{}", expected),
            Arity::AtLeast(min) => write!(f, "at least {}", min),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Func {
    RandomUuid,
    RandomInt,
    RandomIntRange,
    RandomAlphanum,
    RandomPayload,
    RandomIp,
    RandomPort,
    RandomUserAgent,
    RandomRegex,
    Base64Encode,
    Base64Decode,
    Upper,
    Lower,
    Join,
}

impl Func {
    const ALL: [Func; 14] = [
        Func::RandomUuid,
        Func::RandomInt,
        Func::RandomIntRange,
        Func::RandomAlphanum,
        Func::RandomPayload,
        Func::RandomIp,
        Func::RandomPort,
        Func::RandomUserAgent,
        Func::RandomRegex,
        Func::Base64Encode,
        Func::Base64Decode,
        Func::Upper,
        Func::Lower,
        Func::Join,
    ];

    pub(super) fn lookup(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|func| func.name() == name)
    }

    pub(super) const fn name(self) -> &'static str {
        match self {
            Func::RandomUuid => "random_uuid",
            Func::RandomInt => "random_int",
            Func::RandomIntRange => "random_int_range",
            Func::RandomAlphanum => "random_alphanum",
            Func::RandomPayload => "random_payload",
            Func::RandomIp => "random_ip",
            Func::RandomPort => "random_port",
            Func::RandomUserAgent => "random_user_agent",
            Func::RandomRegex => "random_regex",
            Func::Base64Encode => "base64_encode",
            Func::Base64Decode => "base64_decode",
            Func::Upper => "upper",
            Func::Lower => "lower",
            Func::Join => "join",
        }
    }

    pub(super) const fn arity(self) -> Arity {
        match self {
            Func::RandomUuid | Func::RandomIp | Func::RandomPort | Func::RandomUserAgent => {
                Arity::Exact(0)
            }
            Func::RandomInt
            | Func::RandomAlphanum
            | Func::RandomPayload
            | Func::RandomRegex
            | Func::Base64Encode
            | Func::Base64Decode
            | Func::Upper
            | Func::Lower => Arity::Exact(1),
            Func::RandomIntRange => Arity::Exact(2),
            Func::Join => Arity::AtLeast(1),
        }
    }

    /// Evaluates the function. Argument counts were checked at parse time.
    pub(super) fn call(self, args: &[String]) -> Result<String, TemplateError> {
        let mut rng = thread_rng();
        match self {
            Func::RandomUuid => Ok(uuid_from_bytes(rng.r#gen())),
            Func::RandomInt => {
                let upper = int_arg(self, args, 0)?;
                if upper <= 0 {
                    return Err(TemplateError::EmptyRange {
                        function: self.name(),
                        low: 0,
                        high: upper,
                    });
                }
                Ok(rng.gen_range(0..upper).to_string())
            }
            Func::RandomIntRange => {
                let low = int_arg(self, args, 0)?;
                let high = int_arg(self, args, 1)?;
                if low > high {
                    return Err(TemplateError::EmptyRange {
                        function: self.name(),
                        low,
                        high,
                    });
                }
                Ok(rng.gen_range(low..=high).to_string())
            }
            Func::RandomAlphanum => {
                let len = len_arg(self, args)?;
                Ok((&mut rng)
                    .sample_iter(Alphanumeric)
                    .take(len)
                    .map(char::from)
                    .collect())
            }
            Func::RandomPayload => {
                let len = len_arg(self, args)?;
                Ok((0..len)
                    .map(|_| char::from(rng.gen_range(b' '..=b'~')))
                    .collect())
            }
            Func::RandomIp => {
                let [a, b, c, d]: [u8; 4] = rng.r#gen();
                Ok(format!("{}.{}.{}.{}", a, b, c, d))
            }
            Func::RandomPort => Ok(rng.gen_range(1..=u16::MAX).to_string()),
            Func::RandomUserAgent => Ok(pick_user_agent(&mut rng).to_owned()),
            Func::Base64Encode => Ok(STANDARD.encode(str_arg(args, 0))),
            Func::Base64Decode => {
                let bytes = STANDARD.decode(str_arg(args, 0)).map_err(|err| {
                    TemplateError::InvalidBase64 {
                        function: self.name(),
                        source: err,
                    }
                })?;
                Ok(String::from_utf8_lossy(&bytes).into_owned())
            }
            Func::Upper => Ok(str_arg(args, 0).to_uppercase()),
            Func::Lower => Ok(str_arg(args, 0).to_lowercase()),
            Func::Join => Ok(args
                .split_first()
                .map(|(separator, parts)| parts.join(separator.as_str()))
                .unwrap_or_default()),
            // Compiled into its own node at parse time.
            Func::RandomRegex => Ok(String::new()),
        }
    }
}

fn str_arg(args: &[String], index: usize) -> &str {
    args.get(index).map_or("", String::as_str)
}

fn int_arg(func: Func, args: &[String], index: usize) -> Result<i64, TemplateError> {
    let value = str_arg(args, index);
    value
        .trim()
        .parse::<i64>()
        .map_err(|_parse_err| TemplateError::NotAnInteger {
            function: func.name(),
            value: value.to_owned(),
        })
}

fn len_arg(func: Func, args: &[String]) -> Result<usize, TemplateError> {
    let value = int_arg(func, args, 0)?;
    usize::try_from(value)
        .map(|len| len.min(MAX_GENERATED_LEN))
        .map_err(|_negative| TemplateError::EmptyRange {
            function: func.name(),
            low: 0,
            high: value,
        })
}

fn pick_user_agent<R: Rng>(rng: &mut R) -> &'static str {
    USER_AGENTS.choose(rng).copied().unwrap_or_default()
}
