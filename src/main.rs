#![allow(missing_docs)]

use anyhow::Result;

fn main() -> Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(hifi_catalog_lib::run())
}
