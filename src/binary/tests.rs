use std::io::{Read, Write};

use super::{BinaryError, BinaryReader, BinaryWriter, Decode, Encode};

#[derive(Debug, Clone, PartialEq)]
struct MeshRecord {
    name:     String,
    vertices: Vec<f32>,
    indices:  Vec<u16>,
    visible:  bool,
    material: i64,
    tags:     Vec<String>,
}

impl Encode for MeshRecord {
    fn encode<W: Write>(&self, writer: &mut BinaryWriter<W>) -> Result<(), BinaryError> {
        writer.write_str(&self.name)?;
        writer.write_slice(&self.vertices)?;
        writer.write_slice(&self.indices)?;
        writer.write(&self.visible)?;
        writer.write(&self.material)?;
        writer.encode(&self.tags)
    }
}

impl Decode for MeshRecord {
    fn decode<R: Read>(reader: &mut BinaryReader<R>) -> Result<Self, BinaryError> {
        Ok(Self {
            name:     reader.read_string()?,
            vertices: reader.read_vec()?,
            indices:  reader.read_vec()?,
            visible:  reader.read()?,
            material: reader.read()?,
            tags:     reader.decode()?,
        })
    }
}

fn encode(value: &impl Encode) -> Vec<u8> {
    let mut writer = BinaryWriter::new(Vec::new());
    writer.encode(value).expect("Vec writes are infallible");
    writer.into_inner()
}

#[test]
fn test_record_round_trip() {
    let record = MeshRecord {
        name:     "crate_lid".into(),
        vertices: vec![0.0, 1.5, -2.25, f32::MAX],
        indices:  vec![0, 1, 2, 2, 3, 0],
        visible:  true,
        material: -42,
        tags:     vec!["wood".into(), "".into(), "ünïcode".into()],
    };

    let bytes = encode(&record);
    let mut reader = BinaryReader::new(&bytes[..]);
    assert_eq!(reader.decode::<MeshRecord>().expect("valid input"), record);

    // the whole input is consumed
    let mut rest = Vec::new();
    reader.into_inner().read_to_end(&mut rest).expect("slice reads are infallible");
    assert!(rest.is_empty());
}

#[test]
fn test_little_endian_layout() {
    let mut writer = BinaryWriter::new(Vec::new());
    writer.write(&0x0102_0304_u32).expect("infallible");
    writer.write(&-2_i16).expect("infallible");
    writer.write(&1.0_f32).expect("infallible");
    writer.write_str("ab").expect("infallible");
    writer.write_slice(&[7_u16, 0x0100]).expect("infallible");
    assert_eq!(writer.written(), 4 + 2 + 4 + 6 + 8);

    assert_eq!(
        writer.into_inner(),
        vec![
            0x04, 0x03, 0x02, 0x01, // u32
            0xfe, 0xff, // i16
            0x00, 0x00, 0x80, 0x3f, // f32
            0x02, 0x00, 0x00, 0x00, b'a', b'b', // str
            0x02, 0x00, 0x00, 0x00, 0x07, 0x00, 0x00, 0x01, // slice
        ]
    );
}

#[test]
fn test_truncated() {
    let bytes = encode(&"hello".to_string());
    for len in 0..bytes.len() {
        let mut reader = BinaryReader::new(&bytes[..len]);
        assert!(
            matches!(reader.read_string(), Err(BinaryError::Truncated)),
            "{len} bytes should be truncated"
        );
    }
}

#[test]
fn test_invalid_utf8() {
    let mut writer = BinaryWriter::new(Vec::new());
    writer.write_bytes(&[0xff, 0xfe]).expect("infallible");
    let bytes = writer.into_inner();

    let mut reader = BinaryReader::new(&bytes[..]);
    assert!(matches!(reader.read_string(), Err(BinaryError::InvalidUtf8(_))));
}

#[test]
fn test_length_limit() {
    let bytes = encode(&vec![0_u8; 64]);

    let mut reader = BinaryReader::with_length_limit(&bytes[..], 16);
    assert!(matches!(reader.read_vec::<u8>(), Err(BinaryError::LengthTooLarge(16))));

    // a huge count with no data fails without allocating it
    let bytes = u32::MAX.to_le_bytes();
    let mut reader = BinaryReader::with_length_limit(&bytes[..], u32::MAX);
    assert!(matches!(reader.read_vec::<u64>(), Err(BinaryError::Truncated)));
}

#[test]
fn test_invalid_bool() {
    let mut reader = BinaryReader::new(&[2_u8][..]);
    assert!(matches!(
        reader.read::<bool>(),
        Err(BinaryError::InvalidValue { ty: "bool", value: 2 })
    ));
}
