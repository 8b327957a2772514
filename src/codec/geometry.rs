//! The geometry stream codec.
//!
//! A geometry column is flattened into parallel structural arrays keyed by the
//! geometry type sequence:
//! - `num_geometries`: part count of every Multi* geometry
//! - `num_parts`: ring count of every polygon, or vertex count of every line
//!   when the column holds no polygon
//! - `num_rings`: vertex count of every ring, and of every line when the column
//!   holds a polygon
//!
//! Vertices go either straight into a componentwise-delta vertex buffer or into
//! a deduplicated dictionary (Z-order sorted vertices, or Morton codes)
//! referenced through a vertex offset stream. Rings are stored open and closed
//! again on decode.
//!
//! Decoding is a single monotonic pass over the type sequence. Every structural
//! array must be consumed exactly.

use std::collections::BTreeSet;
use std::io::Cursor;

use hashbrown::HashMap;

use crate::codec::integer::{self, IntegerEncoder};
use crate::config::{IntegerEncodingOption, VtileConfig};
use crate::error::VtileError;
use crate::kernels::morton::{self, MortonSettings};
use crate::kernels::{delta, zigzag};
use crate::log_metric;
use crate::metadata::{
    DictionaryType, LengthType, LogicalTechnique, OffsetType, PhysicalStreamType, Stream,
    StreamVariant,
};
use crate::tile::{Coord, Geometry, GeometryType};

//==================================================================================
// 1. Encoding
//==================================================================================

/// Flattened topology of a geometry column, before any stream encoding.
#[derive(Debug, Default)]
struct Topology {
    types: Vec<u32>,
    num_geometries: Vec<u32>,
    num_parts: Vec<u32>,
    num_rings: Vec<u32>,
    vertices: Vec<Coord>,
}

/// A ring without its closing vertex.
fn open_ring(ring: &[Coord]) -> &[Coord] {
    match (ring.first(), ring.last()) {
        (Some(first), Some(last)) if ring.len() > 1 && first == last => &ring[..ring.len() - 1],
        _ => ring,
    }
}

impl Topology {
    fn flatten(geometries: &[&Geometry]) -> Self {
        let contains_polygon = geometries.iter().any(|g| g.geometry_type().is_polygonal());
        let mut t = Topology::default();

        for &geometry in geometries {
            t.types.push(geometry.geometry_type().ordinal());
            match geometry {
                Geometry::Point(c) => t.vertices.push(*c),
                Geometry::LineString(line) => t.push_line(line, contains_polygon),
                Geometry::Polygon(rings) => t.push_polygon(rings),
                Geometry::MultiPoint(points) => {
                    t.num_geometries.push(points.len() as u32);
                    t.vertices.extend_from_slice(points);
                }
                Geometry::MultiLineString(lines) => {
                    t.num_geometries.push(lines.len() as u32);
                    for line in lines {
                        t.push_line(line, contains_polygon);
                    }
                }
                Geometry::MultiPolygon(polygons) => {
                    t.num_geometries.push(polygons.len() as u32);
                    for rings in polygons {
                        t.push_polygon(rings);
                    }
                }
            }
        }
        t
    }

    fn push_line(&mut self, line: &[Coord], contains_polygon: bool) {
        if contains_polygon {
            self.num_rings.push(line.len() as u32);
        } else {
            self.num_parts.push(line.len() as u32);
        }
        self.vertices.extend_from_slice(line);
    }

    fn push_polygon(&mut self, rings: &[Vec<Coord>]) {
        self.num_parts.push(rings.len() as u32);
        for ring in rings {
            let open = open_ring(ring);
            self.num_rings.push(open.len() as u32);
            self.vertices.extend_from_slice(open);
        }
    }
}

fn interleave(vertices: &[Coord]) -> Vec<u32> {
    vertices
        .iter()
        .flat_map(|c| [c.x as u32, c.y as u32])
        .collect()
}

/// Sort key along the Z-order curve over the full 32-bit range.
fn z_order_key(c: &Coord) -> u64 {
    fn spread(v: u32) -> u64 {
        let mut x = v as u64;
        x = (x | (x << 16)) & 0x0000_FFFF_0000_FFFF;
        x = (x | (x << 8)) & 0x00FF_00FF_00FF_00FF;
        x = (x | (x << 4)) & 0x0F0F_0F0F_0F0F_0F0F;
        x = (x | (x << 2)) & 0x3333_3333_3333_3333;
        (x | (x << 1)) & 0x5555_5555_5555_5555
    }
    // Flip the sign bit so negative coordinates order before positive ones.
    let x = (c.x as u32) ^ 0x8000_0000;
    let y = (c.y as u32) ^ 0x8000_0000;
    spread(x) | (spread(y) << 1)
}

fn write_vertex_buffer(
    vertices: &[Coord],
    encoder: &IntegerEncoder,
    out: &mut Vec<u8>,
) -> Result<(), VtileError> {
    let encoded = zigzag::encode(&delta::encode_componentwise(&interleave(vertices))?);
    integer::write_stream(
        PhysicalStreamType::Data(DictionaryType::Vertex),
        LogicalTechnique::ComponentwiseDelta,
        LogicalTechnique::None,
        StreamVariant::Base,
        encoder.physical_for::<u32>(),
        &encoded,
        out,
    )
}

/// Plain layout: one vertex buffer stream.
fn encode_plain_vertices(vertices: &[Coord], encoder: &IntegerEncoder) -> Result<(u32, Vec<u8>), VtileError> {
    let mut out = Vec::new();
    write_vertex_buffer(vertices, encoder, &mut out)?;
    Ok((1, out))
}

fn encode_offsets(offsets: &[u32], encoder: &IntegerEncoder, out: &mut Vec<u8>) -> Result<(), VtileError> {
    integer::encode_stream(
        offsets,
        false,
        PhysicalStreamType::Offset(OffsetType::Vertex),
        encoder,
        out,
    )
}

/// Vertex dictionary layout: offsets into Z-order sorted unique vertices.
fn encode_vertex_dictionary(
    vertices: &[Coord],
    encoder: &IntegerEncoder,
) -> Result<(u32, Vec<u8>), VtileError> {
    let mut dictionary: Vec<Coord> = vertices.iter().copied().collect::<BTreeSet<_>>().into_iter().collect();
    dictionary.sort_by_key(z_order_key);
    let positions: HashMap<Coord, u32> = dictionary
        .iter()
        .enumerate()
        .map(|(i, c)| (*c, i as u32))
        .collect();
    let offsets = vertices
        .iter()
        .map(|c| {
            positions.get(c).copied().ok_or_else(|| {
                VtileError::InternalError("vertex missing from its own dictionary".to_string())
            })
        })
        .collect::<Result<Vec<u32>, _>>()?;

    let mut out = Vec::new();
    encode_offsets(&offsets, encoder, &mut out)?;
    write_vertex_buffer(&dictionary, encoder, &mut out)?;
    Ok((2, out))
}

/// Morton dictionary layout: offsets into ascending unique Morton codes.
fn encode_morton_dictionary(
    vertices: &[Coord],
    encoder: &IntegerEncoder,
) -> Result<(u32, Vec<u8>), VtileError> {
    let components: Vec<i32> = vertices.iter().flat_map(|c| [c.x, c.y]).collect();
    let settings = MortonSettings::for_vertices(&components)?;
    let codes = vertices
        .iter()
        .map(|c| morton::encode(c.x, c.y, &settings))
        .collect::<Result<Vec<u32>, _>>()?;
    let dictionary: Vec<u32> = codes.iter().copied().collect::<BTreeSet<_>>().into_iter().collect();
    let offsets = codes
        .iter()
        .map(|code| {
            dictionary.binary_search(code).map(|i| i as u32).map_err(|_| {
                VtileError::InternalError("Morton code missing from its own dictionary".to_string())
            })
        })
        .collect::<Result<Vec<u32>, _>>()?;

    let mut out = Vec::new();
    encode_offsets(&offsets, encoder, &mut out)?;
    // Sorted codes: plain deltas are never negative, so no zigzag.
    integer::write_stream(
        PhysicalStreamType::Data(DictionaryType::Morton),
        LogicalTechnique::Morton,
        LogicalTechnique::Delta,
        StreamVariant::Morton {
            num_bits: settings.num_bits,
            coordinate_shift: settings.coordinate_shift,
        },
        encoder.physical_for::<u32>(),
        &delta::encode(&dictionary),
        &mut out,
    )?;
    Ok((2, out))
}

/// Encodes a geometry column. Returns the stream count and the stream bytes.
pub fn encode_column<'g>(
    geometries: impl IntoIterator<Item = &'g Geometry>,
    config: &VtileConfig,
) -> Result<(u32, Vec<u8>), VtileError> {
    let geometries: Vec<&Geometry> = geometries.into_iter().collect();
    if geometries.is_empty() {
        return Ok((0, Vec::new()));
    }
    let encoder = IntegerEncoder::from_config(config);
    let topology = Topology::flatten(&geometries);

    let mut out = Vec::new();
    let mut stream_count = 1;
    integer::encode_stream(
        &topology.types,
        false,
        PhysicalStreamType::Data(DictionaryType::None),
        &encoder,
        &mut out,
    )?;
    for (values, length_type) in [
        (&topology.num_geometries, LengthType::Geometries),
        (&topology.num_parts, LengthType::Parts),
        (&topology.num_rings, LengthType::Rings),
    ] {
        if !values.is_empty() {
            integer::encode_stream(values, false, PhysicalStreamType::Length(length_type), &encoder, &mut out)?;
            stream_count += 1;
        }
    }

    let mut best = ("plain", encode_plain_vertices(&topology.vertices, &encoder)?);
    if !topology.vertices.is_empty() {
        // Offsets are arbitrary indices; the auto choice is left to the integer codec.
        let offset_encoder = encoder.with_option(IntegerEncodingOption::Auto);
        if config.use_vertex_dictionary {
            let candidate = encode_vertex_dictionary(&topology.vertices, &offset_encoder)?;
            if candidate.1.len() < best.1 .1.len() {
                best = ("vertex_dictionary", candidate);
            }
        }
        if config.use_morton_dictionary {
            // Coordinates outside the Morton domain simply rule this layout out.
            if let Ok(candidate) = encode_morton_dictionary(&topology.vertices, &offset_encoder) {
                if candidate.1.len() < best.1 .1.len() {
                    best = ("morton_dictionary", candidate);
                }
            }
        }
    }

    let (layout, (vertex_streams, vertex_bytes)) = best;
    log_metric!(
        "event" = "encode_geometry_column",
        "layout" = layout,
        "features" = geometries.len(),
        "vertices" = topology.vertices.len(),
        "vertex_bytes" = vertex_bytes.len()
    );
    out.extend_from_slice(&vertex_bytes);
    Ok((stream_count + vertex_streams, out))
}

//==================================================================================
// 2. Decoding
//==================================================================================

/// Position inside every structural array of a geometry column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TopologyCursor {
    pub geometry: usize,
    pub part: usize,
    pub ring: usize,
    pub vertex: usize,
}

/// The decoded streams of a geometry column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeometryColumn {
    pub geometry_types: Vec<GeometryType>,
    pub num_geometries: Vec<u32>,
    pub num_parts: Vec<u32>,
    pub num_rings: Vec<u32>,
    pub vertex_offsets: Option<Vec<u32>>,
    pub vertex_buffer: Vec<Coord>,
    contains_polygon: bool,
}

fn to_coords(values: &[u32]) -> Result<Vec<Coord>, VtileError> {
    if values.len() % 2 != 0 {
        return Err(VtileError::GeometryError(format!(
            "vertex buffer has odd length {}",
            values.len()
        )));
    }
    Ok(values
        .chunks_exact(2)
        .map(|p| Coord::new(p[0] as i32, p[1] as i32))
        .collect())
}

fn decode_morton_buffer(stream: &Stream<'_>) -> Result<Vec<Coord>, VtileError> {
    let meta = &stream.metadata;
    let settings = match meta.variant {
        StreamVariant::Morton { num_bits, coordinate_shift } => MortonSettings {
            num_bits,
            coordinate_shift,
        },
        _ => {
            return Err(VtileError::MortonError(
                "Morton vertex buffer without a Morton header".to_string(),
            ))
        }
    };
    let mut codes = integer::decode_physical::<u32>(stream)?;
    match meta.logical2 {
        LogicalTechnique::Delta => delta::decode_in_place(&mut codes),
        LogicalTechnique::None => {}
        other => {
            return Err(VtileError::NotSupported(format!(
                "logical technique {:?} on a Morton vertex buffer",
                other
            )))
        }
    }
    codes
        .into_iter()
        .map(|code| morton::decode(code, &settings).map(|(x, y)| Coord::new(x, y)))
        .collect()
}

fn take_count(values: &[u32], index: &mut usize, what: &str) -> Result<usize, VtileError> {
    let value = values.get(*index).copied().ok_or_else(|| {
        VtileError::GeometryError(format!("{} array exhausted at {}", what, index))
    })?;
    *index += 1;
    Ok(value as usize)
}

impl GeometryColumn {
    /// Reads `stream_count` geometry streams from the cursor.
    pub fn decode(cursor: &mut Cursor<&[u8]>, stream_count: u32) -> Result<Self, VtileError> {
        let mut column = GeometryColumn::default();
        let mut types: Option<Vec<u32>> = None;
        let mut seen: Vec<PhysicalStreamType> = Vec::new();

        for _ in 0..stream_count {
            let stream = Stream::read(cursor)?;
            // Both vertex buffer layouts fill the same slot.
            let slot = match stream.metadata.stream_type {
                PhysicalStreamType::Data(DictionaryType::Morton) => PhysicalStreamType::Data(DictionaryType::Vertex),
                other => other,
            };
            if seen.contains(&slot) {
                return Err(VtileError::GeometryError(format!(
                    "duplicate {:?} stream in a geometry column",
                    stream.metadata.stream_type
                )));
            }
            seen.push(slot);
            match stream.metadata.stream_type {
                PhysicalStreamType::Data(DictionaryType::None) => {
                    types = Some(integer::decode_stream::<u32>(&stream, false)?);
                }
                PhysicalStreamType::Length(LengthType::Geometries) => {
                    column.num_geometries = integer::decode_stream(&stream, false)?;
                }
                PhysicalStreamType::Length(LengthType::Parts) => {
                    column.num_parts = integer::decode_stream(&stream, false)?;
                }
                PhysicalStreamType::Length(LengthType::Rings) => {
                    column.num_rings = integer::decode_stream(&stream, false)?;
                }
                PhysicalStreamType::Offset(OffsetType::Vertex) => {
                    column.vertex_offsets = Some(integer::decode_stream(&stream, false)?);
                }
                PhysicalStreamType::Data(DictionaryType::Vertex) => {
                    let values = integer::decode_stream::<u32>(&stream, true)?;
                    column.vertex_buffer = to_coords(&values)?;
                }
                PhysicalStreamType::Data(DictionaryType::Morton) => {
                    column.vertex_buffer = decode_morton_buffer(&stream)?;
                }
                PhysicalStreamType::Length(LengthType::Triangles)
                | PhysicalStreamType::Offset(OffsetType::Index) => {
                    return Err(VtileError::NotSupported(
                        "pre-tessellated geometry streams".to_string(),
                    ));
                }
                other => {
                    return Err(VtileError::GeometryError(format!(
                        "unexpected {:?} stream in a geometry column",
                        other
                    )));
                }
            }
        }

        if stream_count > 0 {
            let types = types.ok_or_else(|| {
                VtileError::GeometryError("geometry column without a type stream".to_string())
            })?;
            column.geometry_types = types
                .into_iter()
                .map(GeometryType::from_ordinal)
                .collect::<Result<_, _>>()?;
        }
        column.contains_polygon = column.geometry_types.iter().any(|t| t.is_polygonal());
        Ok(column)
    }

    pub fn len(&self) -> usize {
        self.geometry_types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.geometry_types.is_empty()
    }

    fn take_vertex(&self, cur: &mut TopologyCursor) -> Result<Coord, VtileError> {
        let index = match &self.vertex_offsets {
            Some(offsets) => take_count(offsets, &mut cur.vertex, "vertex offset")?,
            None => {
                cur.vertex += 1;
                cur.vertex - 1
            }
        };
        self.vertex_buffer.get(index).copied().ok_or_else(|| {
            VtileError::GeometryError(format!(
                "vertex {} outside a buffer of {}",
                index,
                self.vertex_buffer.len()
            ))
        })
    }

    fn take_line(&self, count: usize, cur: &mut TopologyCursor) -> Result<Vec<Coord>, VtileError> {
        let mut line = Vec::with_capacity(count.min(self.vertex_buffer.len()));
        for _ in 0..count {
            line.push(self.take_vertex(cur)?);
        }
        Ok(line)
    }

    fn take_ring(&self, cur: &mut TopologyCursor) -> Result<Vec<Coord>, VtileError> {
        let count = take_count(&self.num_rings, &mut cur.ring, "ring")?;
        let mut ring = self.take_line(count, cur)?;
        if let Some(&first) = ring.first() {
            ring.push(first);
        }
        Ok(ring)
    }

    fn take_linestring(&self, cur: &mut TopologyCursor) -> Result<Vec<Coord>, VtileError> {
        let count = if self.contains_polygon {
            take_count(&self.num_rings, &mut cur.ring, "ring")?
        } else {
            take_count(&self.num_parts, &mut cur.part, "part")?
        };
        self.take_line(count, cur)
    }

    fn take_polygon(&self, cur: &mut TopologyCursor) -> Result<Vec<Vec<Coord>>, VtileError> {
        let num_rings = take_count(&self.num_parts, &mut cur.part, "part")?;
        (0..num_rings).map(|_| self.take_ring(cur)).collect()
    }

    /// Reconstructs the geometry of type `geometry_type` at `cur`, advancing it.
    pub fn read_geometry(
        &self,
        geometry_type: GeometryType,
        cur: &mut TopologyCursor,
    ) -> Result<Geometry, VtileError> {
        Ok(match geometry_type {
            GeometryType::Point => Geometry::Point(self.take_vertex(cur)?),
            GeometryType::LineString => Geometry::LineString(self.take_linestring(cur)?),
            GeometryType::Polygon => Geometry::Polygon(self.take_polygon(cur)?),
            GeometryType::MultiPoint => {
                let count = take_count(&self.num_geometries, &mut cur.geometry, "geometry")?;
                Geometry::MultiPoint(self.take_line(count, cur)?)
            }
            GeometryType::MultiLineString => {
                let count = take_count(&self.num_geometries, &mut cur.geometry, "geometry")?;
                Geometry::MultiLineString(
                    (0..count)
                        .map(|_| self.take_linestring(cur))
                        .collect::<Result<_, _>>()?,
                )
            }
            GeometryType::MultiPolygon => {
                let count = take_count(&self.num_geometries, &mut cur.geometry, "geometry")?;
                Geometry::MultiPolygon(
                    (0..count)
                        .map(|_| self.take_polygon(cur))
                        .collect::<Result<_, _>>()?,
                )
            }
        })
    }

    fn check_exhausted(&self, cur: &TopologyCursor) -> Result<(), VtileError> {
        let vertex_len = self
            .vertex_offsets
            .as_ref()
            .map_or(self.vertex_buffer.len(), |offsets| offsets.len());
        for (what, consumed, len) in [
            ("geometry", cur.geometry, self.num_geometries.len()),
            ("part", cur.part, self.num_parts.len()),
            ("ring", cur.ring, self.num_rings.len()),
            ("vertex", cur.vertex, vertex_len),
        ] {
            if consumed != len {
                return Err(VtileError::GeometryError(format!(
                    "{} array has {} entries, {} consumed",
                    what, len, consumed
                )));
            }
        }
        Ok(())
    }

    /// Validates the whole column in one pass and returns the cursor position
    /// at which every feature's geometry starts.
    pub fn feature_cursors(&self) -> Result<Vec<TopologyCursor>, VtileError> {
        let mut cur = TopologyCursor::default();
        let mut cursors = Vec::with_capacity(self.len());
        for &geometry_type in &self.geometry_types {
            cursors.push(cur);
            self.read_geometry(geometry_type, &mut cur)?;
        }
        self.check_exhausted(&cur)?;
        Ok(cursors)
    }

    /// Reconstructs every geometry of the column.
    pub fn to_geometries(&self) -> Result<Vec<Geometry>, VtileError> {
        let mut cur = TopologyCursor::default();
        let geometries = self
            .geometry_types
            .iter()
            .map(|&t| self.read_geometry(t, &mut cur))
            .collect::<Result<Vec<_>, _>>()?;
        self.check_exhausted(&cur)?;
        Ok(geometries)
    }
}

/// Reads a geometry column and reconstructs every geometry.
pub fn decode_column(cursor: &mut Cursor<&[u8]>, stream_count: u32) -> Result<Vec<Geometry>, VtileError> {
    GeometryColumn::decode(cursor, stream_count)?.to_geometries()
}

//==================================================================================
// 3. Unit Tests
//==================================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn c(x: i32, y: i32) -> Coord {
        Coord::new(x, y)
    }

    fn square(x: i32, y: i32, size: i32) -> Vec<Coord> {
        vec![c(x, y), c(x + size, y), c(x + size, y + size), c(x, y + size), c(x, y)]
    }

    fn roundtrip(geometries: &[Geometry], config: &VtileConfig) -> Vec<Geometry> {
        let (count, bytes) = encode_column(geometries, config).unwrap();
        let mut cursor = Cursor::new(bytes.as_slice());
        let decoded = decode_column(&mut cursor, count).unwrap();
        assert_eq!(cursor.position() as usize, bytes.len());
        decoded
    }

    fn all_layouts() -> Vec<VtileConfig> {
        let plain = VtileConfig {
            use_vertex_dictionary: false,
            use_morton_dictionary: false,
            ..VtileConfig::default()
        };
        let vertex_dictionary = VtileConfig {
            use_morton_dictionary: false,
            ..VtileConfig::default()
        };
        let fastpfor = VtileConfig {
            physical_technique: crate::config::PhysicalTechniqueChoice::FastPfor,
            ..VtileConfig::default()
        };
        vec![plain, vertex_dictionary, VtileConfig::default(), fastpfor]
    }

    fn mixed_geometries() -> Vec<Geometry> {
        vec![
            Geometry::Point(c(1, 2)),
            Geometry::LineString(vec![c(0, 0), c(10, 0), c(10, -10)]),
            Geometry::Polygon(vec![square(0, 0, 100), square(10, 10, 5)]),
            Geometry::MultiPoint(vec![c(5, 5), c(6, 6)]),
            Geometry::MultiLineString(vec![vec![c(0, 0), c(1, 1)], vec![c(2, 2), c(3, 3), c(4, 4)]]),
            Geometry::MultiPolygon(vec![vec![square(200, 200, 10)], vec![square(0, 0, 100), square(1, 1, 2)]]),
        ]
    }

    #[test]
    fn test_mixed_geometries_roundtrip_in_every_layout() {
        let geometries = mixed_geometries();
        for config in all_layouts() {
            assert_eq!(roundtrip(&geometries, &config), geometries);
        }
    }

    #[test]
    fn test_lines_without_polygons_use_parts() {
        let geometries = vec![
            Geometry::LineString(vec![c(0, 0), c(3, 4)]),
            Geometry::MultiLineString(vec![vec![c(1, 1), c(2, 2)]]),
        ];
        let topology = Topology::flatten(&geometries.iter().collect::<Vec<_>>());
        assert_eq!(topology.num_parts, vec![2, 2]);
        assert!(topology.num_rings.is_empty());
        assert_eq!(topology.num_geometries, vec![1]);
        assert_eq!(roundtrip(&geometries, &VtileConfig::default()), geometries);
    }

    #[test]
    fn test_polygon_rings_are_stored_open_and_closed_on_decode() {
        let geometries = vec![Geometry::Polygon(vec![square(0, 0, 4), square(1, 1, 1), square(2, 2, 1)])];
        let topology = Topology::flatten(&geometries.iter().collect::<Vec<_>>());
        assert_eq!(topology.num_parts, vec![3]);
        assert_eq!(topology.num_rings, vec![4, 4, 4]);

        let decoded = roundtrip(&geometries, &VtileConfig::default());
        let Geometry::Polygon(rings) = &decoded[0] else {
            panic!("expected a polygon");
        };
        assert_eq!(rings.len(), 3);
        for ring in rings {
            assert_eq!(ring.first(), ring.last());
        }
    }

    #[test]
    fn test_large_coordinates_skip_morton() {
        let geometries = vec![Geometry::MultiPoint(vec![c(-100_000, 0), c(100_000, 5), c(-100_000, 0)])];
        assert_eq!(roundtrip(&geometries, &VtileConfig::default()), geometries);
    }

    #[test]
    fn test_repeated_vertices_prefer_a_dictionary() {
        let line: Vec<Coord> = (0..200).map(|i| if i % 2 == 0 { c(4000, 100) } else { c(-3000, 7) }).collect();
        let geometries = vec![Geometry::LineString(line)];
        let (count, _) = encode_column(&geometries, &VtileConfig::default()).unwrap();
        assert_eq!(count, 4);
        assert_eq!(roundtrip(&geometries, &VtileConfig::default()), geometries);
    }

    #[test]
    fn test_empty_column() {
        let (count, bytes) = encode_column(&Vec::<Geometry>::new(), &VtileConfig::default()).unwrap();
        assert_eq!(count, 0);
        assert!(bytes.is_empty());
        let mut cursor = Cursor::new(bytes.as_slice());
        assert!(decode_column(&mut cursor, 0).unwrap().is_empty());
    }

    #[test]
    fn test_unexhausted_arrays_are_rejected() {
        let column = GeometryColumn {
            geometry_types: vec![GeometryType::Point],
            vertex_buffer: vec![c(1, 1), c(2, 2)],
            ..GeometryColumn::default()
        };
        assert!(matches!(column.to_geometries(), Err(VtileError::GeometryError(_))));

        let overrun = GeometryColumn {
            geometry_types: vec![GeometryType::LineString],
            num_parts: vec![3],
            vertex_buffer: vec![c(1, 1)],
            ..GeometryColumn::default()
        };
        assert!(overrun.feature_cursors().is_err());
    }

    #[test]
    fn test_unknown_geometry_type_is_fatal() {
        let mut bytes = Vec::new();
        integer::encode_stream(
            &[7u32],
            false,
            PhysicalStreamType::Data(DictionaryType::None),
            &IntegerEncoder::default(),
            &mut bytes,
        )
        .unwrap();
        let mut cursor = Cursor::new(bytes.as_slice());
        assert!(matches!(
            GeometryColumn::decode(&mut cursor, 1),
            Err(VtileError::UnknownEnumValue { kind: "geometry type", value: 7 })
        ));
    }

    #[test]
    fn test_duplicate_streams_are_rejected() {
        let encoder = IntegerEncoder::default();
        let mut bytes = Vec::new();
        integer::encode_stream(&[0u32, 0], false, PhysicalStreamType::Data(DictionaryType::None), &encoder, &mut bytes)
            .unwrap();
        let vertices = PhysicalStreamType::Data(DictionaryType::Vertex);
        integer::encode_stream(&[2u32, 4], true, vertices, &encoder, &mut bytes).unwrap();
        integer::encode_stream(&[6u32, 8], true, vertices, &encoder, &mut bytes).unwrap();
        let mut cursor = Cursor::new(bytes.as_slice());
        assert!(matches!(GeometryColumn::decode(&mut cursor, 3), Err(VtileError::GeometryError(_))));

        let mut cursor = Cursor::new(bytes.as_slice());
        let column = GeometryColumn::decode(&mut cursor, 2).unwrap();
        assert_eq!(column.vertex_buffer, vec![c(2, 4)]);
    }

    #[test]
    fn test_triangle_streams_are_not_supported() {
        let mut bytes = Vec::new();
        integer::encode_stream(
            &[3u32],
            false,
            PhysicalStreamType::Length(LengthType::Triangles),
            &IntegerEncoder::default(),
            &mut bytes,
        )
        .unwrap();
        let mut cursor = Cursor::new(bytes.as_slice());
        assert!(matches!(GeometryColumn::decode(&mut cursor, 1), Err(VtileError::NotSupported(_))));
    }

    #[test]
    fn test_feature_cursors_allow_random_access() {
        let geometries = mixed_geometries();
        let (count, bytes) = encode_column(&geometries, &VtileConfig::default()).unwrap();
        let column = GeometryColumn::decode(&mut Cursor::new(bytes.as_slice()), count).unwrap();
        let cursors = column.feature_cursors().unwrap();
        for i in (0..geometries.len()).rev() {
            let mut cur = cursors[i];
            assert_eq!(column.read_geometry(column.geometry_types[i], &mut cur).unwrap(), geometries[i]);
        }
    }
}
