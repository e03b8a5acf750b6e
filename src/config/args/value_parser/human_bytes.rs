use byte_unit::Byte;
use std::str::FromStr;

pub fn check_human_bytes(value: &str) -> Result<String, String> {
    let result = Byte::from_str(value.trim()).map_err(|e| e.to_string())?;
    TryInto::<u64>::try_into(result.as_u128()).map_err(|e| e.to_string())?;

    Ok(value.to_string())
}

pub fn parse_human_bytes(value: &str) -> Result<u64, String> {
    let result = Byte::from_str(value.trim()).map_err(|e| e.to_string())?;
    u64::try_from(result.as_u128()).map_err(|e| e.to_string())
}
