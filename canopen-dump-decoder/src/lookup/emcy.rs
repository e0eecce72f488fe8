//! Emergency error code descriptions
//!
//! Generic codes come from CiA 301. Devices announcing a known profile in
//! the low 16 bits of their device type get the profile table consulted
//! first. Lookup falls back from the exact code to its high byte, then to
//! its high nibble, so an unlisted sub-code still names its class.

/// Device profile number of CiA 402 drives and motion controllers
pub const PROFILE_DRIVES: u16 = 402;

fn generic_description(code: u16) -> Option<&'static str> {
    let text = match code {
        0x0000 => "Error reset or no error",
        0x1000 => "Generic error",
        0x2000 => "Current",
        0x2100 => "Current, device input side",
        0x2200 => "Current inside the device",
        0x2300 => "Current, device output side",
        0x3000 => "Voltage",
        0x3100 => "Mains voltage",
        0x3200 => "Voltage inside the device",
        0x3300 => "Output voltage",
        0x4000 => "Temperature",
        0x4100 => "Ambient temperature",
        0x4200 => "Device temperature",
        0x5000 => "Device hardware",
        0x6000 => "Device software",
        0x6100 => "Internal software",
        0x6200 => "User software",
        0x6300 => "Data set",
        0x7000 => "Additional modules",
        0x8000 => "Monitoring",
        0x8100 => "Communication",
        0x8110 => "CAN overrun (objects lost)",
        0x8120 => "CAN in error passive mode",
        0x8130 => "Life guard error or heartbeat error",
        0x8140 => "Recovered from bus off",
        0x8150 => "CAN-ID collision",
        0x8200 => "Protocol error",
        0x8210 => "PDO not processed due to length error",
        0x8220 => "PDO length exceeded",
        0x8230 => "DAM MPDO not processed, destination object not available",
        0x8240 => "Unexpected SYNC data length",
        0x8250 => "RPDO timeout",
        0x9000 => "External error",
        0xF000 => "Additional functions",
        0xFF00 => "Device specific",
        _ => return None,
    };
    Some(text)
}

fn drive_description(code: u16) -> Option<&'static str> {
    let text = match code {
        0x2310 => "Continuous over current",
        0x2320 => "Short circuit at outputs",
        0x3210 => "DC link over-voltage",
        0x3220 => "DC link under-voltage",
        0x4210 => "Excess temperature device",
        0x4310 => "Excess temperature drive",
        0x5441 => "Enable input inactive",
        0x7121 => "Motor blocked",
        0x7305 => "Incremental sensor 1 fault",
        0x8611 => "Following error",
        0x8612 => "Reference limit",
        _ => return None,
    };
    Some(text)
}

/// Human-readable text for an emergency error code
///
/// `device_profile` is the low 16 bits of the node's device type, `None`
/// when the device type has not been seen.
pub fn error_code_to_string(code: u16, device_profile: Option<u16>) -> &'static str {
    let profile_text = match device_profile {
        Some(PROFILE_DRIVES) => drive_description(code),
        _ => None,
    };

    profile_text
        .or_else(|| generic_description(code))
        .or_else(|| generic_description(code & 0xFF00))
        .or_else(|| generic_description(code & 0xF000))
        .unwrap_or("Unknown error")
}
