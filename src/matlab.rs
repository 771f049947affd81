//! MATLAB Level 4 matrix files, the format the simulator writes its mesh,
//! microenvironment and cell matrices in.
//!
//! Each matrix is a 20-byte header (type, rows, cols, imaginary flag, name
//! length), the variable name, then `rows * cols` values in column-major
//! order. A file may hold several matrices back to back.

use byteorder::{BigEndian, ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};
use log::trace;
use ndarray::{Array2, ShapeBuilder};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MatrixError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("Unsupported matrix header {code}: {reason}")]
    Unsupported { code: u32, reason: &'static str },
    #[error("Matrix '{name}' declares {rows}x{cols} elements, which does not fit in memory")]
    TooLarge { name: String, rows: u32, cols: u32 },
    #[error("Variable '{wanted}' not found (file holds {found:?})")]
    VariableNotFound { wanted: String, found: Vec<String> },
}

/// A matrix together with the variable name it was stored under.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedMatrix {
    pub name: String,
    pub data: Array2<f64>,
}

// Decoded from the 4-digit type code MOPT.
#[derive(Debug, Clone, Copy)]
struct Header {
    big_endian: bool,
    data_format: u32,
    rows: u32,
    cols: u32,
    name_len: u32,
}

/// Reads every matrix stored in `reader`.
pub fn read_matrices<R: Read>(mut reader: R) -> Result<Vec<NamedMatrix>, MatrixError> {
    let mut matrices = Vec::new();
    while let Some(raw_type) = read_type_word(&mut reader)? {
        let header = read_header(&mut reader, raw_type)?;
        let matrix = if header.big_endian {
            read_body::<BigEndian, _>(&mut reader, header)?
        } else {
            read_body::<LittleEndian, _>(&mut reader, header)?
        };
        trace!(
            "Read matrix '{}' ({}x{})",
            matrix.name,
            matrix.data.nrows(),
            matrix.data.ncols()
        );
        matrices.push(matrix);
    }
    Ok(matrices)
}

/// Loads the matrix stored under `variable` in the file at `path`.
pub fn load_matrix<P: AsRef<Path>>(path: P, variable: &str) -> Result<Array2<f64>, MatrixError> {
    let file = File::open(path.as_ref())?;
    let matrices = read_matrices(BufReader::new(file))?;
    let found: Vec<String> = matrices.iter().map(|m| m.name.clone()).collect();
    matrices
        .into_iter()
        .find(|m| m.name == variable)
        .map(|m| m.data)
        .ok_or_else(|| MatrixError::VariableNotFound {
            wanted: variable.to_string(),
            found,
        })
}

/// Writes `data` as a little-endian double matrix named `name`.
///
/// The name is written without a trailing NUL, as the simulator does.
pub fn write_matrix<W: Write>(mut writer: W, name: &str, data: &Array2<f64>) -> Result<(), MatrixError> {
    let (rows, cols) = data.dim();
    let rows = u32::try_from(rows).map_err(|_| too_large(name, data))?;
    let cols = u32::try_from(cols).map_err(|_| too_large(name, data))?;
    let name_len = u32::try_from(name.len()).map_err(|_| too_large(name, data))?;

    writer.write_u32::<LittleEndian>(0)?; // little-endian, doubles, full matrix
    writer.write_u32::<LittleEndian>(rows)?;
    writer.write_u32::<LittleEndian>(cols)?;
    writer.write_u32::<LittleEndian>(0)?; // real only
    writer.write_u32::<LittleEndian>(name_len)?;
    writer.write_all(name.as_bytes())?;
    // Transposed logical order walks `data` column by column.
    for value in data.t().iter() {
        writer.write_f64::<LittleEndian>(*value)?;
    }
    writer.flush()?;
    Ok(())
}

/// Creates (or truncates) `path` and writes a single matrix to it.
pub fn save_matrix<P: AsRef<Path>>(path: P, name: &str, data: &Array2<f64>) -> Result<(), MatrixError> {
    let file = File::create(path.as_ref())?;
    write_matrix(BufWriter::new(file), name, data)
}

fn too_large(name: &str, data: &Array2<f64>) -> MatrixError {
    MatrixError::TooLarge {
        name: name.to_string(),
        rows: data.nrows().min(u32::MAX as usize) as u32,
        cols: data.ncols().min(u32::MAX as usize) as u32,
    }
}

// Returns None on a clean end of file between matrices.
fn read_type_word<R: Read>(reader: &mut R) -> Result<Option<[u8; 4]>, MatrixError> {
    let mut buf = [0u8; 4];
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..])?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "truncated matrix header").into());
        }
        filled += n;
    }
    Ok(Some(buf))
}

fn read_header<R: Read>(reader: &mut R, raw_type: [u8; 4]) -> Result<Header, MatrixError> {
    // Little-endian files carry M = 0 so the code stays below 1000; big-endian
    // files carry M = 1. Reading the word both ways tells them apart.
    let le = LittleEndian::read_u32(&raw_type);
    let be = BigEndian::read_u32(&raw_type);
    let (code, big_endian) = if le < 1000 {
        (le, false)
    } else if (1000..2000).contains(&be) {
        (be, true)
    } else {
        return Err(MatrixError::Unsupported { code: le, reason: "unknown numeric format" });
    };

    let reserved = (code % 1000) / 100;
    let data_format = (code % 100) / 10;
    let matrix_type = code % 10;
    if reserved != 0 {
        return Err(MatrixError::Unsupported { code, reason: "reserved digit must be zero" });
    }
    if data_format > 5 {
        return Err(MatrixError::Unsupported { code, reason: "unknown data format" });
    }
    if matrix_type != 0 {
        return Err(MatrixError::Unsupported { code, reason: "only full numeric matrices are supported" });
    }

    let mut words = [0u32; 4];
    if big_endian {
        reader.read_u32_into::<BigEndian>(&mut words)?;
    } else {
        reader.read_u32_into::<LittleEndian>(&mut words)?;
    }
    let [rows, cols, imaginary, name_len] = words;
    if imaginary != 0 {
        return Err(MatrixError::Unsupported { code, reason: "complex matrices are not supported" });
    }

    Ok(Header { big_endian, data_format, rows, cols, name_len })
}

/// Reads exactly `len` bytes, growing the buffer only as data arrives, so a
/// corrupt header cannot force a huge allocation up front.
fn read_bytes<R: Read>(reader: &mut R, len: u64) -> Result<Vec<u8>, MatrixError> {
    let mut buf = Vec::new();
    reader.by_ref().take(len).read_to_end(&mut buf)?;
    if (buf.len() as u64) < len {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("matrix data ends after {} of {} bytes", buf.len(), len),
        )
        .into());
    }
    Ok(buf)
}

fn element_size(data_format: u32) -> u64 {
    match data_format {
        0 => 8,
        1 | 2 => 4,
        3 | 4 => 2,
        _ => 1,
    }
}

fn read_body<B: ByteOrder, R: Read>(reader: &mut R, header: Header) -> Result<NamedMatrix, MatrixError> {
    let mut name_bytes = read_bytes(reader, u64::from(header.name_len))?;
    // MATLAB itself NUL-terminates the name; the simulator does not.
    while name_bytes.last() == Some(&0) {
        name_bytes.pop();
    }
    let name = String::from_utf8_lossy(&name_bytes).into_owned();

    let too_large = || MatrixError::TooLarge {
        name: name.clone(),
        rows: header.rows,
        cols: header.cols,
    };
    let rows = header.rows as usize;
    let cols = header.cols as usize;
    let count = rows.checked_mul(cols).ok_or_else(too_large)?;
    let byte_len = u64::from(header.rows)
        .checked_mul(u64::from(header.cols))
        .and_then(|n| n.checked_mul(element_size(header.data_format)))
        .ok_or_else(too_large)?;

    let raw = read_bytes(reader, byte_len)?;
    let values = match header.data_format {
        0 => {
            let mut values = vec![0.0f64; count];
            B::read_f64_into(&raw, &mut values);
            values
        }
        1 => {
            let mut values = vec![0.0f32; count];
            B::read_f32_into(&raw, &mut values);
            values.into_iter().map(f64::from).collect()
        }
        2 => {
            let mut values = vec![0i32; count];
            B::read_i32_into(&raw, &mut values);
            values.into_iter().map(f64::from).collect()
        }
        3 => {
            let mut values = vec![0i16; count];
            B::read_i16_into(&raw, &mut values);
            values.into_iter().map(f64::from).collect()
        }
        4 => {
            let mut values = vec![0u16; count];
            B::read_u16_into(&raw, &mut values);
            values.into_iter().map(f64::from).collect()
        }
        _ => raw.into_iter().map(f64::from).collect(),
    };

    let data = Array2::from_shape_vec((rows, cols).f(), values).map_err(|e| {
        MatrixError::Io(io::Error::new(io::ErrorKind::InvalidData, e.to_string()))
    })?;
    Ok(NamedMatrix { name, data })
}
