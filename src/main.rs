mod entry;

use trafficgen::error::AppResult;

fn main() -> AppResult<()> {
    entry::run()
}
