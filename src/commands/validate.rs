//! Validate a request envelope without invoking anything

use anyhow::Result;
use serde_json::json;

use crate::schema;

pub fn run(input: &str) -> Result<()> {
    schema::parse_requests(input)?;
    println!("{}", json!({"valid": true}));
    Ok(())
}
