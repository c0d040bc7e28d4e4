//! Raw GRIB2 section scanning.
//!
//! Only the grid definition section (3) of the first message is parsed here;
//! it supplies the projection parameters for grids whose coordinates the
//! decoder cannot compute itself. Value decoding is left to the `grib` crate.

/// Mean earth radius used by NCEP grids with shape-of-earth code 6 (meters).
pub const EARTH_RADIUS_M: f64 = 6_371_229.0;

/// Parameters of a Lambert conformal grid (template 3.30).
#[derive(Debug, Clone, PartialEq)]
pub struct LambertTemplate {
    pub nx: usize,
    pub ny: usize,
    pub lat1: f64,
    pub lon1: f64,
    pub lov: f64,
    pub dx_m: f64,
    pub dy_m: f64,
    pub latin1: f64,
    pub latin2: f64,
    pub scanning_mode: u8,
}

/// Grid definition of the first message.
#[derive(Debug, Clone, PartialEq)]
pub enum GridTemplate {
    Lambert(LambertTemplate),
    Other(u16),
}

/// Parse the grid definition of the first GRIB2 message in `data`.
pub fn parse_first_grid(data: &[u8]) -> Option<GridTemplate> {
    let start = find_message_start(data)?;
    let message = &data[start..];
    let offset = find_section(message, 3)?;
    let section = &message[offset..];
    if section.len() < 14 {
        return None;
    }

    // Bytes 12-13: grid definition template number; template data from byte 14
    let template = u16::from_be_bytes([section[12], section[13]]);
    let gd = &section[14..];

    match template {
        30 => parse_lambert(gd).map(GridTemplate::Lambert),
        other => Some(GridTemplate::Other(other)),
    }
}

fn parse_lambert(gd: &[u8]) -> Option<LambertTemplate> {
    // Template 3.30 offsets relative to octet 15:
    //  16-19 Nx, 20-23 Ny, 24-27 La1, 28-31 Lo1, 33-36 LaD, 37-40 LoV,
    //  41-44 Dx (mm), 45-48 Dy (mm), 50 scanning mode, 51-54 Latin1, 55-58 Latin2
    if gd.len() < 59 {
        return None;
    }
    let micro = |v: i64| v as f64 * 1e-6;

    Some(LambertTemplate {
        nx: read_u32(gd, 16) as usize,
        ny: read_u32(gd, 20) as usize,
        lat1: micro(read_signed(gd, 24)),
        lon1: micro(read_u32(gd, 28) as i64),
        lov: micro(read_u32(gd, 37) as i64),
        dx_m: read_u32(gd, 41) as f64 / 1000.0,
        dy_m: read_u32(gd, 45) as f64 / 1000.0,
        scanning_mode: gd[50],
        latin1: micro(read_signed(gd, 51)),
        latin2: micro(read_signed(gd, 55)),
    })
}

fn find_message_start(data: &[u8]) -> Option<usize> {
    data.windows(4).position(|w| w == b"GRIB")
}

/// Find a section by number within a message. Returns its byte offset.
fn find_section(data: &[u8], section_num: u8) -> Option<usize> {
    let mut offset = 16; // After Section 0

    while offset + 5 <= data.len() {
        let section_length = read_u32(data, offset) as usize;
        if section_length < 5 || offset + section_length > data.len() {
            return None;
        }

        let current_section = data[offset + 4];
        if current_section == section_num {
            return Some(offset);
        }
        if current_section == 7 {
            return None;
        }
        offset += section_length;
    }
    None
}

fn read_u32(data: &[u8], at: usize) -> u32 {
    u32::from_be_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}

/// GRIB2 signed integers use sign-magnitude encoding.
fn read_signed(data: &[u8], at: usize) -> i64 {
    let raw = read_u32(data, at);
    let magnitude = (raw & 0x7fff_ffff) as i64;
    if raw & 0x8000_0000 != 0 {
        -magnitude
    } else {
        magnitude
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    fn put_u32(buf: &mut [u8], at: usize, v: u32) {
        buf[at..at + 4].copy_from_slice(&v.to_be_bytes());
    }

    fn put_signed(buf: &mut [u8], at: usize, v: i64) {
        let raw = if v < 0 {
            (v.unsigned_abs() as u32) | 0x8000_0000
        } else {
            v as u32
        };
        put_u32(buf, at, raw);
    }

    /// Minimal message: section 0, section 1 stub, section 3 (template 30).
    pub(crate) fn lambert_message(t: &LambertTemplate) -> Vec<u8> {
        let mut msg = vec![0u8; 16];
        msg[0..4].copy_from_slice(b"GRIB");
        msg[7] = 2;

        let mut sec1 = vec![0u8; 21];
        put_u32(&mut sec1, 0, 21);
        sec1[4] = 1;
        msg.extend(sec1);

        let mut sec3 = vec![0u8; 14 + 67];
        let len = sec3.len() as u32;
        put_u32(&mut sec3, 0, len);
        sec3[4] = 3;
        sec3[12..14].copy_from_slice(&30u16.to_be_bytes());
        let gd = &mut sec3[14..];
        gd[0] = 6;
        put_u32(gd, 16, t.nx as u32);
        put_u32(gd, 20, t.ny as u32);
        put_signed(gd, 24, (t.lat1 * 1e6).round() as i64);
        put_u32(gd, 28, (t.lon1 * 1e6).round() as u32);
        put_u32(gd, 37, (t.lov * 1e6).round() as u32);
        put_u32(gd, 41, (t.dx_m * 1000.0) as u32);
        put_u32(gd, 45, (t.dy_m * 1000.0) as u32);
        gd[50] = t.scanning_mode;
        put_signed(gd, 51, (t.latin1 * 1e6).round() as i64);
        put_signed(gd, 55, (t.latin2 * 1e6).round() as i64);
        msg.extend(sec3);

        let total = msg.len() as u32;
        put_u32(&mut msg, 12, total);
        msg
    }

    pub(crate) fn hrrr_template() -> LambertTemplate {
        LambertTemplate {
            nx: 1799,
            ny: 1059,
            lat1: 21.138123,
            lon1: 237.280472,
            lov: 262.5,
            dx_m: 3000.0,
            dy_m: 3000.0,
            latin1: 38.5,
            latin2: 38.5,
            scanning_mode: 0x40,
        }
    }

    #[test]
    fn test_parse_lambert_template() {
        let template = hrrr_template();
        let bytes = lambert_message(&template);

        match parse_first_grid(&bytes) {
            Some(GridTemplate::Lambert(parsed)) => {
                assert_eq!(parsed.nx, 1799);
                assert_eq!(parsed.ny, 1059);
                assert!((parsed.lat1 - 21.138123).abs() < 1e-6);
                assert!((parsed.lon1 - 237.280472).abs() < 1e-6);
                assert!((parsed.lov - 262.5).abs() < 1e-6);
                assert_eq!(parsed.dx_m, 3000.0);
                assert_eq!(parsed.scanning_mode, 0x40);
            }
            other => panic!("expected a Lambert template, got {:?}", other),
        }
    }

    #[test]
    fn test_sign_magnitude() {
        let mut buf = [0u8; 4];
        put_signed(&mut buf, 0, -45_000_000);
        assert_eq!(read_signed(&buf, 0), -45_000_000);
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(parse_first_grid(b"not a grib file at all").is_none());
    }
}
