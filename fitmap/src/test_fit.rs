//! Minimal FIT encoder for tests: a file_id message followed by `record`
//! messages built from four local definitions.

use crate::geo::degrees_to_semicircles;

const CRC_TABLE: [u16; 16] = [
    0x0000, 0xCC01, 0xD801, 0x1400, 0xF001, 0x3C00, 0x2800, 0xE401, 0xA001, 0x6C00, 0x7800,
    0xB401, 0x5000, 0x9C01, 0x8801, 0x4400,
];

/// Seconds since the FIT epoch (1989-12-31T00:00:00Z) for the first record.
pub const BASE_TIMESTAMP: u32 = 1_000_000_000;

const MESG_FILE_ID: u16 = 0;
const MESG_RECORD: u16 = 20;

const LOCAL_FILE_ID: u8 = 0;
const LOCAL_FULL: u8 = 1;
const LOCAL_NO_SPEED: u8 = 2;
const LOCAL_NO_POSITION: u8 = 3;
const LOCAL_ENHANCED: u8 = 4;

const BASE_ENUM: u8 = 0x00;
const BASE_UINT16: u8 = 0x84;
const BASE_SINT32: u8 = 0x85;
const BASE_UINT32: u8 = 0x86;

const FIELD_TIMESTAMP: (u8, u8, u8) = (253, 4, BASE_UINT32);
const FIELD_LAT: (u8, u8, u8) = (0, 4, BASE_SINT32);
const FIELD_LON: (u8, u8, u8) = (1, 4, BASE_SINT32);
const FIELD_SPEED: (u8, u8, u8) = (6, 2, BASE_UINT16);
const FIELD_ENHANCED_SPEED: (u8, u8, u8) = (73, 4, BASE_UINT32);

pub struct TestRecord {
    offset_s: u32,
    position: Option<(f64, f64)>,
    speed_mps: Option<f64>,
    enhanced: bool,
}

impl TestRecord {
    pub fn full(offset_s: u32, lat: f64, lon: f64, speed_mps: f64) -> Self {
        Self {
            offset_s,
            position: Some((lat, lon)),
            speed_mps: Some(speed_mps),
            enhanced: false,
        }
    }

    pub fn without_speed(offset_s: u32, lat: f64, lon: f64) -> Self {
        Self {
            offset_s,
            position: Some((lat, lon)),
            speed_mps: None,
            enhanced: false,
        }
    }

    /// Speed stored only in the 32-bit `enhanced_speed` field.
    pub fn enhanced_speed_only(offset_s: u32, lat: f64, lon: f64, speed_mps: f64) -> Self {
        Self {
            offset_s,
            position: Some((lat, lon)),
            speed_mps: Some(speed_mps),
            enhanced: true,
        }
    }

    pub fn without_position(offset_s: u32, speed_mps: f64) -> Self {
        Self {
            offset_s,
            position: None,
            speed_mps: Some(speed_mps),
            enhanced: false,
        }
    }
}

#[derive(Default)]
pub struct FitBuilder {
    records: Vec<TestRecord>,
}

impl FitBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(mut self, record: TestRecord) -> Self {
        self.records.push(record);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut data = Vec::new();
        definition(&mut data, LOCAL_FILE_ID, MESG_FILE_ID, &[(0, 1, BASE_ENUM)]);
        definition(
            &mut data,
            LOCAL_FULL,
            MESG_RECORD,
            &[FIELD_TIMESTAMP, FIELD_LAT, FIELD_LON, FIELD_SPEED],
        );
        definition(
            &mut data,
            LOCAL_NO_SPEED,
            MESG_RECORD,
            &[FIELD_TIMESTAMP, FIELD_LAT, FIELD_LON],
        );
        definition(
            &mut data,
            LOCAL_NO_POSITION,
            MESG_RECORD,
            &[FIELD_TIMESTAMP, FIELD_SPEED],
        );
        definition(
            &mut data,
            LOCAL_ENHANCED,
            MESG_RECORD,
            &[FIELD_TIMESTAMP, FIELD_LAT, FIELD_LON, FIELD_ENHANCED_SPEED],
        );

        // file_id.type = activity
        data.push(LOCAL_FILE_ID);
        data.push(4);

        for record in &self.records {
            let local = match (record.position, record.speed_mps) {
                (Some(_), Some(_)) if record.enhanced => LOCAL_ENHANCED,
                (Some(_), Some(_)) => LOCAL_FULL,
                (Some(_), None) => LOCAL_NO_SPEED,
                (None, Some(_)) => LOCAL_NO_POSITION,
                (None, None) => continue,
            };
            data.push(local);
            data.extend_from_slice(&(BASE_TIMESTAMP + record.offset_s).to_le_bytes());
            if let Some((lat, lon)) = record.position {
                data.extend_from_slice(&semicircles(lat).to_le_bytes());
                data.extend_from_slice(&semicircles(lon).to_le_bytes());
            }
            match record.speed_mps {
                Some(speed) if record.enhanced => {
                    let raw = (speed * 1000.0).round() as u32;
                    data.extend_from_slice(&raw.to_le_bytes());
                }
                Some(speed) => {
                    let raw = (speed * 1000.0).round() as u16;
                    data.extend_from_slice(&raw.to_le_bytes());
                }
                None => {}
            }
        }

        let mut out = Vec::with_capacity(data.len() + 16);
        out.push(14);
        out.push(0x10);
        out.extend_from_slice(&2100u16.to_le_bytes());
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(b".FIT");
        let header_crc = crc(&out);
        out.extend_from_slice(&header_crc.to_le_bytes());
        out.extend_from_slice(&data);
        let file_crc = crc(&out);
        out.extend_from_slice(&file_crc.to_le_bytes());
        out
    }
}

fn definition(out: &mut Vec<u8>, local: u8, global: u16, fields: &[(u8, u8, u8)]) {
    out.push(0x40 | local);
    out.push(0);
    out.push(0);
    out.extend_from_slice(&global.to_le_bytes());
    out.push(fields.len() as u8);
    for &(num, size, base) in fields {
        out.extend_from_slice(&[num, size, base]);
    }
}

fn semicircles(degrees: f64) -> i32 {
    degrees_to_semicircles(degrees).round() as i32
}

fn crc(bytes: &[u8]) -> u16 {
    bytes.iter().fold(0u16, |mut crc, &byte| {
        let mut tmp = CRC_TABLE[(crc & 0xF) as usize];
        crc = (crc >> 4) & 0x0FFF;
        crc = crc ^ tmp ^ CRC_TABLE[(byte & 0xF) as usize];
        tmp = CRC_TABLE[(crc & 0xF) as usize];
        crc = (crc >> 4) & 0x0FFF;
        crc ^ tmp ^ CRC_TABLE[((byte >> 4) & 0xF) as usize]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc_of_appended_crc_is_zero() {
        let header = [14u8, 0x10, 0x34, 0x08, 0, 0, 0, 0, b'.', b'F', b'I', b'T'];
        let mut buf = header.to_vec();
        buf.extend_from_slice(&crc(&header).to_le_bytes());
        assert_eq!(crc(&buf), 0);
    }
}
