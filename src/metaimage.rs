//! Reader for MetaImage volumes (`.mhd` header + raw file, or `.mha` with
//! the data appended to the header).
//!
//! Only uncompressed 3D scalar images of 8- or 16-bit integer elements are
//! supported. Samples are stored x-fastest on disk.

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use log::debug;
use ndarray::Array3;
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::volume::VolumeBuffer;
use crate::volume_loader::VolumeLoaderError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElementType {
    Char,
    UChar,
    Short,
    UShort,
}

impl ElementType {
    fn parse(value: &str) -> Result<Self, VolumeLoaderError> {
        match value {
            "MET_CHAR" => Ok(ElementType::Char),
            "MET_UCHAR" => Ok(ElementType::UChar),
            "MET_SHORT" => Ok(ElementType::Short),
            "MET_USHORT" => Ok(ElementType::UShort),
            other => Err(VolumeLoaderError::UnsupportedElementType(other.to_string())),
        }
    }

    pub fn size_of(self) -> usize {
        match self {
            ElementType::Char | ElementType::UChar => 1,
            ElementType::Short | ElementType::UShort => 2,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DataFile {
    /// Data follows the header in the same file
    Local,
    External(PathBuf),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetaImageHeader {
    /// `(x, y, z)` extents
    pub dim_size: (usize, usize, usize),
    pub element_type: ElementType,
    pub big_endian: bool,
    /// Bytes to skip before the data. `None` means the data sits at the end.
    pub header_size: Option<usize>,
    pub data_file: DataFile,
}

impl MetaImageHeader {
    /// Voxel count and byte length of the data. Fails when `DimSize` does
    /// not fit in memory at all.
    pub fn data_len(&self) -> Result<(usize, usize), VolumeLoaderError> {
        let (x, y, z) = self.dim_size;
        let voxels = x.checked_mul(y).and_then(|xy| xy.checked_mul(z));
        let bytes = voxels.and_then(|n| n.checked_mul(self.element_type.size_of()));
        match (voxels, bytes) {
            (Some(voxels), Some(bytes)) => Ok((voxels, bytes)),
            _ => Err(invalid("DimSize", &format!("{x} {y} {z}"))),
        }
    }
}

fn invalid(field: &str, value: &str) -> VolumeLoaderError {
    VolumeLoaderError::InvalidHeaderField {
        field: field.to_string(),
        value: value.to_string(),
    }
}

fn parse_bool(field: &str, value: &str) -> Result<bool, VolumeLoaderError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(invalid(field, value)),
    }
}

/// Parses header lines up to and including `ElementDataFile`, which must be
/// the last field. Returns the header and the byte offset just past it.
pub fn parse_header(bytes: &[u8]) -> Result<(MetaImageHeader, usize), VolumeLoaderError> {
    let mut ndims = None;
    let mut dim_size = None;
    let mut element_type = None;
    let mut big_endian = false;
    let mut header_size = Some(0);
    let mut offset = 0;

    for line in bytes.split_inclusive(|&b| b == b'\n') {
        offset += line.len();
        let line = String::from_utf8_lossy(line);
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let (key, value) = (key.trim(), value.trim());

        match key {
            "NDims" => {
                ndims = Some(value.parse::<usize>().map_err(|_| invalid(key, value))?);
            }
            "DimSize" => {
                let dims = value
                    .split_whitespace()
                    .map(str::parse::<usize>)
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|_| invalid(key, value))?;
                dim_size = Some(dims);
            }
            "ElementType" => element_type = Some(ElementType::parse(value)?),
            "ElementByteOrderMSB" | "BinaryDataByteOrderMSB" => {
                big_endian = parse_bool(key, value)?
            }
            "HeaderSize" => {
                let size = value.parse::<i64>().map_err(|_| invalid(key, value))?;
                header_size = usize::try_from(size).ok();
            }
            "CompressedData" => {
                if parse_bool(key, value)? {
                    return Err(VolumeLoaderError::CompressedDataUnsupported);
                }
            }
            "ElementNumberOfChannels" => {
                if value != "1" {
                    return Err(invalid(key, value));
                }
            }
            "ElementDataFile" => {
                let data_file = if value.eq_ignore_ascii_case("LOCAL") {
                    DataFile::Local
                } else {
                    DataFile::External(PathBuf::from(value))
                };
                let ndims = ndims.ok_or(VolumeLoaderError::MissingHeaderField("NDims"))?;
                if ndims != 3 {
                    return Err(VolumeLoaderError::UnsupportedDimensions(ndims));
                }
                let dims = dim_size.ok_or(VolumeLoaderError::MissingHeaderField("DimSize"))?;
                let &[x, y, z] = dims.as_slice() else {
                    return Err(VolumeLoaderError::UnsupportedDimensions(dims.len()));
                };
                let element_type =
                    element_type.ok_or(VolumeLoaderError::MissingHeaderField("ElementType"))?;
                let header = MetaImageHeader {
                    dim_size: (x, y, z),
                    element_type,
                    big_endian,
                    header_size,
                    data_file,
                };
                header.data_len()?;
                return Ok((header, offset));
            }
            _ => {}
        }
    }
    Err(VolumeLoaderError::MissingHeaderField("ElementDataFile"))
}

/// Converts raw element bytes to `[x, y, z]` ordered intensities.
///
/// `MET_USHORT` values above `i16::MAX` saturate.
pub fn decode_voxels(
    header: &MetaImageHeader,
    raw: &[u8],
) -> Result<VolumeBuffer, VolumeLoaderError> {
    let (count, expected) = header.data_len()?;
    if raw.len() < expected {
        return Err(VolumeLoaderError::TruncatedData {
            expected,
            actual: raw.len(),
        });
    }
    let raw = &raw[..expected];
    let (x, y, z) = header.dim_size;

    let voxels: Vec<i16> = match header.element_type {
        ElementType::Char => raw.iter().map(|&b| i16::from(b as i8)).collect(),
        ElementType::UChar => raw.iter().map(|&b| i16::from(b)).collect(),
        ElementType::Short => {
            let mut voxels = vec![0i16; count];
            if header.big_endian {
                BigEndian::read_i16_into(raw, &mut voxels);
            } else {
                LittleEndian::read_i16_into(raw, &mut voxels);
            }
            voxels
        }
        ElementType::UShort => {
            let mut voxels = vec![0u16; count];
            if header.big_endian {
                BigEndian::read_u16_into(raw, &mut voxels);
            } else {
                LittleEndian::read_u16_into(raw, &mut voxels);
            }
            voxels
                .into_iter()
                .map(|v| i16::try_from(v).unwrap_or(i16::MAX))
                .collect()
        }
    };

    // x is fastest on disk, so the file is a [z, y, x] array.
    let data = Array3::from_shape_vec((z, y, x), voxels).map_err(|_| {
        VolumeLoaderError::TruncatedData {
            expected,
            actual: raw.len(),
        }
    })?;
    Ok(VolumeBuffer::new(data.permuted_axes([2, 1, 0]))?)
}

fn skip_header<'a>(
    header: &MetaImageHeader,
    data: &'a [u8],
) -> Result<&'a [u8], VolumeLoaderError> {
    let (_, expected) = header.data_len()?;
    let start = match header.header_size {
        Some(size) => size,
        None => data
            .len()
            .checked_sub(expected)
            .ok_or(VolumeLoaderError::TruncatedData {
                expected,
                actual: data.len(),
            })?,
    };
    data.get(start..).ok_or(VolumeLoaderError::TruncatedData {
        expected: start.saturating_add(expected),
        actual: data.len(),
    })
}

pub fn read(path: &Path) -> Result<VolumeBuffer, VolumeLoaderError> {
    let bytes = fs::read(path)?;
    let (header, header_end) = parse_header(&bytes)?;
    debug!("MetaImage header {}: {header:?}", path.display());

    match &header.data_file {
        DataFile::Local => decode_voxels(&header, skip_header(&header, &bytes[header_end..])?),
        DataFile::External(file) => {
            let data_path = path.parent().map_or_else(|| file.clone(), |dir| dir.join(file));
            let data = fs::read(&data_path)?;
            decode_voxels(&header, skip_header(&header, &data)?)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const HEADER: &str = "ObjectType = Image\n\
        NDims = 3\n\
        DimSize = 3 2 2\n\
        ElementType = MET_SHORT\n\
        ElementByteOrderMSB = False\n\
        ElementDataFile = LOCAL\n";

    #[test]
    fn parses_local_header() {
        let (header, end) = parse_header(HEADER.as_bytes()).unwrap();
        assert_eq!(end, HEADER.len());
        assert_eq!(header.dim_size, (3, 2, 2));
        assert_eq!(header.element_type, ElementType::Short);
        assert!(!header.big_endian);
        assert_eq!(header.data_file, DataFile::Local);
        assert_eq!(header.data_len().unwrap(), (12, 24));
    }

    #[test]
    fn decodes_x_fastest_order() {
        let (header, _) = parse_header(HEADER.as_bytes()).unwrap();
        let values: Vec<i16> = (0..12).map(|v| v * 10 - 50).collect();
        let mut raw = vec![0u8; 24];
        LittleEndian::write_i16_into(&values, &mut raw);

        let volume = decode_voxels(&header, &raw).unwrap();
        assert_eq!(volume.dimensions(), (3, 2, 2));
        // linear index = x + 3 * (y + 2 * z)
        assert_eq!(volume.sample(0, 0, 0).unwrap(), -50);
        assert_eq!(volume.sample(2, 0, 0).unwrap(), -30);
        assert_eq!(volume.sample(0, 1, 0).unwrap(), -20);
        assert_eq!(volume.sample(1, 1, 1).unwrap(), 50);
    }

    #[test]
    fn big_endian_unsigned_saturates() {
        let text = "NDims = 3\nDimSize = 2 1 1\nElementType = MET_USHORT\n\
            BinaryDataByteOrderMSB = True\nElementDataFile = LOCAL\n";
        let (header, _) = parse_header(text.as_bytes()).unwrap();
        let volume = decode_voxels(&header, &[0x01, 0x00, 0xff, 0xff]).unwrap();
        assert_eq!(volume.sample(0, 0, 0).unwrap(), 256);
        assert_eq!(volume.sample(1, 0, 0).unwrap(), i16::MAX);
    }

    #[test]
    fn rejects_unsupported_headers() {
        let compressed = "NDims = 3\nCompressedData = True\nElementDataFile = LOCAL\n";
        assert!(matches!(
            parse_header(compressed.as_bytes()),
            Err(VolumeLoaderError::CompressedDataUnsupported)
        ));

        let two_d = "NDims = 2\nDimSize = 4 4\nElementType = MET_SHORT\nElementDataFile = LOCAL\n";
        assert!(matches!(
            parse_header(two_d.as_bytes()),
            Err(VolumeLoaderError::UnsupportedDimensions(2))
        ));

        let float = "NDims = 3\nElementType = MET_FLOAT\n";
        assert!(matches!(
            parse_header(float.as_bytes()),
            Err(VolumeLoaderError::UnsupportedElementType(_))
        ));

        assert!(matches!(
            parse_header(b"NDims = 3\n"),
            Err(VolumeLoaderError::MissingHeaderField("ElementDataFile"))
        ));
    }

    #[test]
    fn oversized_dim_size_is_rejected() {
        let text = "NDims = 3\nDimSize = 4294967296 4294967296 2\n\
            ElementType = MET_SHORT\nElementDataFile = LOCAL\n";
        assert!(matches!(
            parse_header(text.as_bytes()),
            Err(VolumeLoaderError::InvalidHeaderField { ref field, .. }) if field == "DimSize"
        ));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("huge.mha");
        let mut bytes = text.as_bytes().to_vec();
        bytes.extend([0u8; 16]);
        fs::write(&path, bytes).unwrap();
        assert!(matches!(
            read(&path),
            Err(VolumeLoaderError::InvalidHeaderField { .. })
        ));

        let header = MetaImageHeader {
            dim_size: (usize::MAX, 1, 1),
            element_type: ElementType::Short,
            big_endian: false,
            header_size: Some(0),
            data_file: DataFile::Local,
        };
        assert!(decode_voxels(&header, &[0u8; 16]).is_err());
    }

    #[test]
    fn short_data_is_truncated() {
        let (header, _) = parse_header(HEADER.as_bytes()).unwrap();
        assert!(matches!(
            decode_voxels(&header, &[0u8; 10]),
            Err(VolumeLoaderError::TruncatedData {
                expected: 24,
                actual: 10
            })
        ));
    }

    #[test]
    fn reads_detached_raw_file() {
        let dir = tempfile::tempdir().unwrap();
        let header = "NDims = 3\nDimSize = 2 2 1\nElementType = MET_UCHAR\n\
            HeaderSize = -1\nElementDataFile = head.raw\n";
        fs::write(dir.path().join("head.mhd"), header).unwrap();
        let mut raw = fs::File::create(dir.path().join("head.raw")).unwrap();
        raw.write_all(&[9, 9, 1, 2, 3, 4]).unwrap();
        drop(raw);

        let volume = read(&dir.path().join("head.mhd")).unwrap();
        assert_eq!(volume.dimensions(), (2, 2, 1));
        assert_eq!(volume.sample(0, 0, 0).unwrap(), 1);
        assert_eq!(volume.sample(1, 1, 0).unwrap(), 4);
    }
}
