//! SDO abort code descriptions (CiA 301)

/// Description of a known abort code
pub fn abort_description(code: u32) -> Option<&'static str> {
    let text = match code {
        0x0503_0000 => "Toggle bit not alternated",
        0x0504_0000 => "SDO protocol timed out",
        0x0504_0001 => "Client/server command specifier not valid or unknown",
        0x0504_0002 => "Invalid block size",
        0x0504_0003 => "Invalid sequence number",
        0x0504_0004 => "CRC error",
        0x0504_0005 => "Out of memory",
        0x0601_0000 => "Unsupported access to an object",
        0x0601_0001 => "Attempt to read a write only object",
        0x0601_0002 => "Attempt to write a read only object",
        0x0602_0000 => "Object does not exist in the object dictionary",
        0x0604_0041 => "Object cannot be mapped to the PDO",
        0x0604_0042 => "The number and length of the objects to be mapped would exceed PDO length",
        0x0604_0043 => "General parameter incompatibility reason",
        0x0604_0047 => "General internal incompatibility in the device",
        0x0606_0000 => "Access failed due to a hardware error",
        0x0607_0010 => "Data type does not match, length of service parameter does not match",
        0x0607_0012 => "Data type does not match, length of service parameter too high",
        0x0607_0013 => "Data type does not match, length of service parameter too low",
        0x0609_0011 => "Sub-index does not exist",
        0x0609_0030 => "Invalid value for parameter",
        0x0609_0031 => "Value of parameter written too high",
        0x0609_0032 => "Value of parameter written too low",
        0x0609_0036 => "Maximum value is less than minimum value",
        0x060A_0023 => "Resource not available: SDO connection",
        0x0800_0000 => "General error",
        0x0800_0020 => "Data cannot be transferred or stored to the application",
        0x0800_0021 => {
            "Data cannot be transferred or stored to the application because of local control"
        }
        0x0800_0022 => {
            "Data cannot be transferred or stored to the application because of the present device state"
        }
        0x0800_0023 => "Object dictionary dynamic generation fails or no object dictionary is present",
        0x0800_0024 => "No data available",
        _ => return None,
    };
    Some(text)
}

/// Human-readable description of an SDO abort code
pub fn sdo_abort_to_string(code: u32) -> String {
    abort_description(code)
        .map(str::to_string)
        .unwrap_or_else(|| format!("Unknown abort code 0x{:08X}", code))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_abort_codes() {
        assert_eq!(
            sdo_abort_to_string(0x0602_0000),
            "Object does not exist in the object dictionary"
        );
        assert_eq!(sdo_abort_to_string(0x0503_0000), "Toggle bit not alternated");
    }

    #[test]
    fn test_unknown_abort_code() {
        assert_eq!(sdo_abort_to_string(0x1234_5678), "Unknown abort code 0x12345678");
    }
}
