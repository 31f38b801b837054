use griffin_common::QualityFlag;
use std::{
    io::{Read, Write},
    mem::size_of,
};

pub(crate) const HIT_SIZE: usize = 3 * size_of::<u8>() + 5 * size_of::<f64>();
pub(crate) const ADDBACK_SIZE: usize =
    2 * size_of::<u8>() + size_of::<u32>() + 2 * size_of::<f64>();
pub(crate) const COUNTS_SIZE: usize = 2 * size_of::<u32>();

fn load_scalar<R: Read, const B: usize>(
    reader: &mut R,
    total_bytes: &mut usize,
) -> Result<[u8; B], std::io::Error> {
    let mut bytes = [0; B];
    reader.read_exact(&mut bytes)?;
    *total_bytes += B;
    Ok(bytes)
}

pub(crate) fn load_u8<R: Read>(
    reader: &mut R,
    total_bytes: &mut usize,
) -> Result<u8, std::io::Error> {
    Ok(u8::from_le_bytes(load_scalar::<R, 1>(reader, total_bytes)?))
}

pub(crate) fn load_u32<R: Read>(
    reader: &mut R,
    total_bytes: &mut usize,
) -> Result<u32, std::io::Error> {
    Ok(u32::from_le_bytes(load_scalar::<R, 4>(reader, total_bytes)?))
}

pub(crate) fn load_f64<R: Read>(
    reader: &mut R,
    total_bytes: &mut usize,
) -> Result<f64, std::io::Error> {
    Ok(f64::from_le_bytes(load_scalar::<R, 8>(reader, total_bytes)?))
}

pub(crate) fn load_magic<R: Read>(
    reader: &mut R,
    total_bytes: &mut usize,
) -> Result<[u8; 4], std::io::Error> {
    load_scalar::<R, 4>(reader, total_bytes)
}

pub(crate) fn quality_to_byte(quality: QualityFlag) -> u8 {
    match quality {
        QualityFlag::Good => 0,
        QualityFlag::Pileup => 1,
    }
}

pub(crate) fn quality_from_byte(byte: u8) -> Option<QualityFlag> {
    match byte {
        0 => Some(QualityFlag::Good),
        1 => Some(QualityFlag::Pileup),
        _ => None,
    }
}

pub(crate) fn save_u8<W: Write>(writer: &mut W, value: u8) -> Result<(), std::io::Error> {
    writer.write_all(&value.to_le_bytes())
}

pub(crate) fn save_u32<W: Write>(writer: &mut W, value: u32) -> Result<(), std::io::Error> {
    writer.write_all(&value.to_le_bytes())
}

pub(crate) fn save_f64<W: Write>(writer: &mut W, value: f64) -> Result<(), std::io::Error> {
    writer.write_all(&value.to_le_bytes())
}
