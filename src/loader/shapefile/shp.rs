//! `.shp` geometry decoding
//!
//! File layout: a 100-byte header (big-endian file code and length,
//! little-endian version and shape type) followed by records. Each record has
//! an 8-byte big-endian header and a little-endian body. Z and M values are
//! skipped; only x/y reach the GeoJSON output.

use crate::error::ParseError;
use crate::geojson::{Geometry, Position};
use byteorder::{BigEndian, LittleEndian, ReadBytesExt};
use std::io::{self, Cursor, Seek, SeekFrom};

const FILE_CODE: i32 = 9994;
const HEADER_LEN: usize = 100;
const RECORD_HEADER_LEN: usize = 8;

fn truncated(_: io::Error) -> ParseError {
    ParseError::Shapefile("unexpected end of .shp data".to_string())
}

/// Decodes every record of a `.shp` file. Null shapes come back as `None`.
pub fn read_shapes(bytes: &[u8]) -> Result<Vec<Option<Geometry>>, ParseError> {
    if bytes.len() < HEADER_LEN {
        return Err(ParseError::Shapefile(format!(
            ".shp header needs {} bytes, got {}",
            HEADER_LEN,
            bytes.len()
        )));
    }

    let mut header = Cursor::new(bytes);
    let file_code = header.read_i32::<BigEndian>().map_err(truncated)?;
    if file_code != FILE_CODE {
        return Err(ParseError::Shapefile(format!(
            "bad .shp file code {} (expected {})",
            file_code, FILE_CODE
        )));
    }
    header.seek(SeekFrom::Start(24)).map_err(truncated)?;
    // Length is counted in 16-bit words
    let declared_len = header.read_i32::<BigEndian>().map_err(truncated)?.max(0) as usize * 2;
    let end = if declared_len >= HEADER_LEN {
        declared_len.min(bytes.len())
    } else {
        bytes.len()
    };

    let mut shapes = Vec::new();
    let mut offset = HEADER_LEN;
    while offset + RECORD_HEADER_LEN <= end {
        let mut record_header = Cursor::new(&bytes[offset..offset + RECORD_HEADER_LEN]);
        let record_number = record_header.read_i32::<BigEndian>().map_err(truncated)?;
        let content_len = record_header.read_i32::<BigEndian>().map_err(truncated)?;
        if content_len < 0 {
            return Err(ParseError::Shapefile(format!(
                "record {} has negative length",
                record_number
            )));
        }

        let start = offset + RECORD_HEADER_LEN;
        let stop = start + content_len as usize * 2;
        if stop > bytes.len() {
            return Err(ParseError::Shapefile(format!(
                "record {} runs past the end of the file",
                record_number
            )));
        }

        shapes.push(read_record(&bytes[start..stop])?);
        offset = stop;
    }

    Ok(shapes)
}

fn read_record(content: &[u8]) -> Result<Option<Geometry>, ParseError> {
    if content.is_empty() {
        return Ok(None);
    }

    let mut cursor = Cursor::new(content);
    let shape_type = cursor.read_i32::<LittleEndian>().map_err(truncated)?;

    match shape_type {
        0 => Ok(None),
        // Point, PointZ, PointM
        1 | 11 | 21 => {
            let x = cursor.read_f64::<LittleEndian>().map_err(truncated)?;
            let y = cursor.read_f64::<LittleEndian>().map_err(truncated)?;
            Ok(Some(Geometry::Point { coordinates: vec![x, y] }))
        }
        // MultiPoint, MultiPointZ, MultiPointM
        8 | 18 | 28 => {
            skip_box(&mut cursor)?;
            let num_points = read_count(&mut cursor)?;
            let mut points = read_points(&mut cursor, num_points)?;
            Ok(match points.len() {
                0 => None,
                1 => points.pop().map(|coordinates| Geometry::Point { coordinates }),
                _ => Some(Geometry::MultiPoint { coordinates: points }),
            })
        }
        // PolyLine, PolyLineZ, PolyLineM
        3 | 13 | 23 => {
            let mut lines = read_parts(&mut cursor)?;
            Ok(match lines.len() {
                0 => None,
                1 => lines.pop().map(|coordinates| Geometry::LineString { coordinates }),
                _ => Some(Geometry::MultiLineString { coordinates: lines }),
            })
        }
        // Polygon, PolygonZ, PolygonM
        5 | 15 | 25 => Ok(assemble_polygons(read_parts(&mut cursor)?)),
        other => Err(ParseError::Shapefile(format!("unsupported shape type {}", other))),
    }
}

fn skip_box(cursor: &mut Cursor<&[u8]>) -> Result<(), ParseError> {
    cursor.seek(SeekFrom::Current(32)).map_err(truncated)?;
    Ok(())
}

fn read_count(cursor: &mut Cursor<&[u8]>) -> Result<usize, ParseError> {
    let count = cursor.read_i32::<LittleEndian>().map_err(truncated)?;
    usize::try_from(count).map_err(|_| ParseError::Shapefile(format!("negative count {}", count)))
}

fn remaining(cursor: &Cursor<&[u8]>) -> usize {
    cursor.get_ref().len().saturating_sub(cursor.position() as usize)
}

fn read_points(cursor: &mut Cursor<&[u8]>, count: usize) -> Result<Vec<Position>, ParseError> {
    // Reject counts the record cannot hold before allocating for them
    if count.saturating_mul(16) > remaining(cursor) {
        return Err(ParseError::Shapefile(format!(
            "record declares {} points but is too short",
            count
        )));
    }
    let mut points = Vec::with_capacity(count);
    for _ in 0..count {
        let x = cursor.read_f64::<LittleEndian>().map_err(truncated)?;
        let y = cursor.read_f64::<LittleEndian>().map_err(truncated)?;
        points.push(vec![x, y]);
    }
    Ok(points)
}

/// Reads the box/parts/points body shared by polylines and polygons, split into parts
fn read_parts(cursor: &mut Cursor<&[u8]>) -> Result<Vec<Vec<Position>>, ParseError> {
    skip_box(cursor)?;
    let num_parts = read_count(cursor)?;
    let num_points = read_count(cursor)?;

    if num_parts.saturating_mul(4) > remaining(cursor) {
        return Err(ParseError::Shapefile(format!(
            "record declares {} parts but is too short",
            num_parts
        )));
    }
    let mut starts = Vec::with_capacity(num_parts);
    for _ in 0..num_parts {
        starts.push(read_count(cursor)?);
    }
    let mut points = read_points(cursor, num_points)?;

    // Split back to front so each part can be drained off the tail
    let mut parts = Vec::with_capacity(num_parts);
    let mut end = num_points;
    for &start in starts.iter().rev() {
        if start > end {
            return Err(ParseError::Shapefile(format!(
                "part index {} out of order (part ends at {})",
                start, end
            )));
        }
        parts.push(points.split_off(start));
        end = start;
    }
    parts.reverse();
    parts.retain(|p| !p.is_empty());
    Ok(parts)
}

/// Groups shapefile rings into polygons.
///
/// Clockwise rings are outer boundaries; counter-clockwise rings are holes and
/// go to the first outer ring that contains their first vertex. A hole with no
/// enclosing ring becomes a polygon of its own.
fn assemble_polygons(rings: Vec<Vec<Position>>) -> Option<Geometry> {
    let mut polygons: Vec<Vec<Vec<Position>>> = Vec::new();
    let mut holes = Vec::new();

    for ring in rings {
        if is_clockwise(&ring) {
            polygons.push(vec![ring]);
        } else {
            holes.push(ring);
        }
    }

    for hole in holes {
        let owner = hole
            .first()
            .and_then(|p| polygons.iter().position(|poly| ring_contains(&poly[0], p)));
        match owner {
            Some(index) => polygons[index].push(hole),
            None => polygons.push(vec![hole]),
        }
    }

    match polygons.len() {
        0 => None,
        1 => polygons.pop().map(|coordinates| Geometry::Polygon { coordinates }),
        _ => Some(Geometry::MultiPolygon { coordinates: polygons }),
    }
}

fn is_clockwise(ring: &[Position]) -> bool {
    let sum: f64 = ring
        .windows(2)
        .map(|w| (w[1][0] - w[0][0]) * (w[1][1] + w[0][1]))
        .sum();
    sum > 0.0
}

/// Even-odd ray casting
fn ring_contains(ring: &[Position], point: &Position) -> bool {
    let (px, py) = (point[0], point[1]);
    let mut inside = false;
    let mut j = ring.len().wrapping_sub(1);
    for i in 0..ring.len() {
        let (xi, yi) = (ring[i][0], ring[i][1]);
        let (xj, yj) = (ring[j][0], ring[j][1]);
        if (yi > py) != (yj > py) && px < (xj - xi) * (py - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use byteorder::WriteBytesExt;

    /// Builds a `.shp` file from pre-encoded record bodies
    pub(crate) fn build_shp(shape_type: i32, bodies: &[Vec<u8>]) -> Vec<u8> {
        let records_len: usize = bodies.iter().map(|b| b.len() + RECORD_HEADER_LEN).sum();
        let mut out = Vec::new();
        out.write_i32::<BigEndian>(FILE_CODE).unwrap();
        out.resize(24, 0);
        out.write_i32::<BigEndian>(((HEADER_LEN + records_len) / 2) as i32).unwrap();
        out.write_i32::<LittleEndian>(1000).unwrap();
        out.write_i32::<LittleEndian>(shape_type).unwrap();
        out.resize(HEADER_LEN, 0);
        for (i, body) in bodies.iter().enumerate() {
            out.write_i32::<BigEndian>(i as i32 + 1).unwrap();
            out.write_i32::<BigEndian>((body.len() / 2) as i32).unwrap();
            out.extend_from_slice(body);
        }
        out
    }

    pub(crate) fn point_body(x: f64, y: f64) -> Vec<u8> {
        let mut body = Vec::new();
        body.write_i32::<LittleEndian>(1).unwrap();
        body.write_f64::<LittleEndian>(x).unwrap();
        body.write_f64::<LittleEndian>(y).unwrap();
        body
    }

    pub(crate) fn parts_body(shape_type: i32, parts: &[Vec<[f64; 2]>]) -> Vec<u8> {
        let mut body = Vec::new();
        body.write_i32::<LittleEndian>(shape_type).unwrap();
        for _ in 0..4 {
            body.write_f64::<LittleEndian>(0.0).unwrap();
        }
        let total: usize = parts.iter().map(Vec::len).sum();
        body.write_i32::<LittleEndian>(parts.len() as i32).unwrap();
        body.write_i32::<LittleEndian>(total as i32).unwrap();
        let mut start = 0;
        for part in parts {
            body.write_i32::<LittleEndian>(start as i32).unwrap();
            start += part.len();
        }
        for point in parts.iter().flatten() {
            body.write_f64::<LittleEndian>(point[0]).unwrap();
            body.write_f64::<LittleEndian>(point[1]).unwrap();
        }
        body
    }

    fn null_body() -> Vec<u8> {
        vec![0, 0, 0, 0]
    }

    // clockwise square
    fn outer(x0: f64, y0: f64, size: f64) -> Vec<[f64; 2]> {
        vec![[x0, y0], [x0, y0 + size], [x0 + size, y0 + size], [x0 + size, y0], [x0, y0]]
    }

    #[test]
    fn test_points_and_null() {
        let shp = build_shp(1, &[point_body(1.0, 2.0), null_body(), point_body(-3.5, 4.25)]);
        let shapes = read_shapes(&shp).unwrap();
        assert_eq!(shapes.len(), 3);
        assert_eq!(shapes[0], Some(Geometry::Point { coordinates: vec![1.0, 2.0] }));
        assert_eq!(shapes[1], None);
        assert_eq!(shapes[2], Some(Geometry::Point { coordinates: vec![-3.5, 4.25] }));
    }

    #[test]
    fn test_polyline_parts() {
        let single = parts_body(3, &[vec![[0.0, 0.0], [1.0, 1.0]]]);
        let multi = parts_body(3, &[vec![[0.0, 0.0], [1.0, 1.0]], vec![[5.0, 5.0], [6.0, 6.0], [7.0, 5.0]]]);
        let shapes = read_shapes(&build_shp(3, &[single, multi])).unwrap();

        assert_eq!(shapes[0].as_ref().map(Geometry::type_name), Some("LineString"));
        match &shapes[1] {
            Some(Geometry::MultiLineString { coordinates }) => {
                assert_eq!(coordinates.len(), 2);
                assert_eq!(coordinates[1].len(), 3);
                assert_eq!(coordinates[1][2], vec![7.0, 5.0]);
            }
            other => panic!("expected multilinestring, got {:?}", other),
        }
    }

    #[test]
    fn test_polygon_hole_assignment() {
        let mut hole = outer(2.0, 2.0, 1.0);
        hole.reverse();
        let body = parts_body(5, &[outer(0.0, 0.0, 10.0), hole, outer(20.0, 20.0, 1.0)]);
        let shapes = read_shapes(&build_shp(5, &[body])).unwrap();

        match &shapes[0] {
            Some(Geometry::MultiPolygon { coordinates }) => {
                assert_eq!(coordinates.len(), 2);
                assert_eq!(coordinates[0].len(), 2, "hole belongs to the first polygon");
                assert_eq!(coordinates[1].len(), 1);
            }
            other => panic!("expected multipolygon, got {:?}", other),
        }
    }

    #[test]
    fn test_single_polygon() {
        let body = parts_body(5, &[outer(0.0, 0.0, 1.0)]);
        let shapes = read_shapes(&build_shp(5, &[body])).unwrap();
        assert_eq!(shapes[0].as_ref().map(Geometry::type_name), Some("Polygon"));
    }

    #[test]
    fn test_bad_input() {
        assert!(matches!(read_shapes(&[0u8; 10]), Err(ParseError::Shapefile(_))));

        let mut shp = build_shp(1, &[point_body(1.0, 2.0)]);
        shp[3] = 0; // corrupt file code
        assert!(matches!(read_shapes(&shp), Err(ParseError::Shapefile(_))));

        let mut shp = build_shp(1, &[point_body(1.0, 2.0)]);
        shp.truncate(shp.len() - 4);
        assert!(matches!(read_shapes(&shp), Err(ParseError::Shapefile(_))));

        let mut body = Vec::new();
        body.write_i32::<LittleEndian>(31).unwrap(); // multipatch
        assert!(matches!(
            read_shapes(&build_shp(31, &[body])),
            Err(ParseError::Shapefile(_))
        ));
    }

    #[test]
    fn test_ring_helpers() {
        let square: Vec<Position> = outer(0.0, 0.0, 4.0).iter().map(|p| p.to_vec()).collect();
        assert!(is_clockwise(&square));
        assert!(ring_contains(&square, &vec![2.0, 2.0]));
        assert!(!ring_contains(&square, &vec![5.0, 2.0]));
    }
}
