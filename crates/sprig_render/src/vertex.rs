use std::borrow::Cow;
use std::ops::Range;

use crate::{
    error::{RenderError, Result},
    gpu::{AttributeFormat, DataType, GraphicsApi},
    state::GpuContext,
};

pub const POSITION_ATTRIBUTE: &str = "a_position";
pub const COLOR_ATTRIBUTE: &str = "a_color";
pub const NORMAL_ATTRIBUTE: &str = "a_normal";
pub const TEXCOORD_ATTRIBUTE: &str = "a_texCoord";

/// Describes one attribute of a vertex: its name, shader location & component format
///
/// Immutable; the `with_*` methods return modified copies. Two attributes are equal when
/// index, name, data type, component count & normalization match.
#[derive(Debug, Clone)]
pub struct VertexAttribute {
    name: Cow<'static, str>,
    index: Option<u32>,
    data_type: DataType,
    count: u8,
    normalized: bool,
    // fed by one float whose bits already hold the packed components
    packed: bool,
}

impl PartialEq for VertexAttribute {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
            && self.name == other.name
            && self.data_type == other.data_type
            && self.count == other.count
            && self.normalized == other.normalized
    }
}

impl VertexAttribute {
    /// Creates an attribute of `count` components (1 to 4) of `data_type`
    pub fn new(
        name: impl Into<Cow<'static, str>>,
        data_type: DataType,
        count: u8,
        normalized: bool,
    ) -> Result<Self> {
        if !(1..=4).contains(&count) {
            return Err(RenderError::InvalidComponentCount(count));
        }
        Ok(Self {
            name: name.into(),
            index: None,
            data_type,
            count,
            normalized,
            packed: false,
        })
    }

    const fn preset(name: &'static str, data_type: DataType, count: u8, normalized: bool) -> Self {
        Self {
            name: Cow::Borrowed(name),
            index: None,
            data_type,
            count,
            normalized,
            packed: false,
        }
    }

    pub const fn position_2d() -> Self {
        Self::preset(POSITION_ATTRIBUTE, DataType::Float, 2, false)
    }

    pub const fn position_3d() -> Self {
        Self::preset(POSITION_ATTRIBUTE, DataType::Float, 3, false)
    }

    /// Four normalized bytes fed by one float from [`Color::to_float_bits`](crate::Color::to_float_bits)
    pub fn color_packed() -> Self {
        Self {
            packed: true,
            ..Self::preset(COLOR_ATTRIBUTE, DataType::UnsignedByte, 4, true)
        }
    }

    pub const fn color_unpacked() -> Self {
        Self::preset(COLOR_ATTRIBUTE, DataType::Float, 4, false)
    }

    pub const fn normal() -> Self {
        Self::preset(NORMAL_ATTRIBUTE, DataType::Float, 3, false)
    }

    /// Texture coordinates for texture unit `unit`, named `a_texCoord{unit}`
    pub fn tex_coords(unit: u32) -> Self {
        Self {
            name: Cow::Owned(format!("{TEXCOORD_ATTRIBUTE}{unit}")),
            ..Self::preset(TEXCOORD_ATTRIBUTE, DataType::Float, 2, false)
        }
    }

    pub fn with_index(&self, index: u32) -> Self {
        Self {
            index: Some(index),
            ..self.clone()
        }
    }

    pub fn with_name(&self, name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }

    pub fn with_normalized(&self, normalized: bool) -> Self {
        Self {
            normalized,
            ..self.clone()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shader location; always set once the attribute belongs to a layout
    pub fn index(&self) -> Option<u32> {
        self.index
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn count(&self) -> u8 {
        self.count
    }

    pub fn normalized(&self) -> bool {
        self.normalized
    }

    pub fn is_packed(&self) -> bool {
        self.packed
    }

    /// Bytes taken by one vertex's worth of this attribute on the GPU
    pub fn byte_size(&self) -> usize {
        self.data_type.size() * self.count as usize
    }

    /// Floats of CPU-side vertex data consumed per vertex
    pub fn source_floats(&self) -> usize {
        if self.packed { 1 } else { self.count as usize }
    }

    pub fn format(&self) -> AttributeFormat {
        AttributeFormat {
            data_type: self.data_type,
            count: self.count,
            normalized: self.normalized,
        }
    }

    // Appends one vertex's worth of this attribute, converting from floats
    fn encode(&self, src: &[f32], out: &mut Vec<u8>) {
        if self.packed {
            out.extend_from_slice(&src[0].to_bits().to_le_bytes());
            return;
        }
        let norm = self.normalized;
        for &v in src {
            match self.data_type {
                DataType::Float => out.extend_from_slice(&v.to_le_bytes()),
                DataType::Double => out.extend_from_slice(&(v as f64).to_le_bytes()),
                DataType::Byte => {
                    let b = if norm { (v.clamp(-1.0, 1.0) * 127.0).round() } else { v };
                    out.extend_from_slice(&(b as i8).to_le_bytes());
                }
                DataType::UnsignedByte => {
                    let b = if norm { (v.clamp(0.0, 1.0) * 255.0).round() } else { v };
                    out.push(b as u8);
                }
                DataType::Short => {
                    let s = if norm { (v.clamp(-1.0, 1.0) * 32767.0).round() } else { v };
                    out.extend_from_slice(&(s as i16).to_le_bytes());
                }
                DataType::UnsignedShort => {
                    let s = if norm { (v.clamp(0.0, 1.0) * 65535.0).round() } else { v };
                    out.extend_from_slice(&(s as u16).to_le_bytes());
                }
                DataType::Int => {
                    let i = if norm {
                        (v.clamp(-1.0, 1.0) as f64 * i32::MAX as f64).round()
                    } else {
                        v as f64
                    };
                    out.extend_from_slice(&(i as i32).to_le_bytes());
                }
                DataType::UnsignedInt => {
                    let i = if norm {
                        (v.clamp(0.0, 1.0) as f64 * u32::MAX as f64).round()
                    } else {
                        v as f64
                    };
                    out.extend_from_slice(&(i as u32).to_le_bytes());
                }
            }
        }
    }
}

/// A slice of encoded vertex bytes & where it belongs in the GPU buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedRun {
    pub dst_offset: usize,
    pub src: Range<usize>,
}

/// Ordered set of attributes & how they are arranged in a vertex buffer
///
/// - `Interleaved`: all attributes of one vertex sit back to back, `stride` bytes per vertex
/// - `Flat`: each attribute gets its own contiguous run covering every vertex, in order
///
/// CPU-side vertex data follows the same arrangement: per-vertex float groups for
/// interleaved layouts, one float run per attribute for flat ones.
#[derive(Debug, Clone, PartialEq)]
pub enum VertexLayout {
    Interleaved {
        attributes: Vec<VertexAttribute>,
        stride: usize,
    },
    Flat {
        attributes: Vec<VertexAttribute>,
    },
}

impl VertexLayout {
    pub fn interleaved() -> Self {
        Self::Interleaved {
            attributes: Vec::new(),
            stride: 0,
        }
    }

    pub fn flat() -> Self {
        Self::Flat {
            attributes: Vec::new(),
        }
    }

    /// Position, packed color & one set of texture coordinates, interleaved
    ///
    /// Fails with [`RenderError::DuplicateAttribute`] when two of the names are equal.
    pub fn sprite(position: &str, color: &str, tex_coords: &str) -> Result<Self> {
        Self::interleaved()
            .with(VertexAttribute::position_2d().with_name(position.to_owned()))?
            .with(VertexAttribute::color_packed().with_name(color.to_owned()))?
            .with(VertexAttribute::tex_coords(0).with_name(tex_coords.to_owned()))
    }

    /// Builder form of [`add_attribute`](Self::add_attribute)
    pub fn with(mut self, attribute: VertexAttribute) -> Result<Self> {
        self.add_attribute(attribute)?;
        Ok(self)
    }

    /// Appends an attribute, assigning the lowest free location if it has none
    ///
    /// Returns the location the attribute ended up with.
    pub fn add_attribute(&mut self, attribute: VertexAttribute) -> Result<u32> {
        if self.get(attribute.name()).is_some() {
            return Err(RenderError::DuplicateAttribute(attribute.name().to_owned()));
        }
        let taken = |index: u32| self.attributes().iter().any(|a| a.index == Some(index));
        let index = match attribute.index {
            Some(index) if taken(index) => return Err(RenderError::DuplicateAttributeIndex(index)),
            Some(index) => index,
            None => (0..).find(|&i| !taken(i)).unwrap_or_default(),
        };
        let attribute = attribute.with_index(index);

        match self {
            Self::Interleaved { attributes, stride } => {
                *stride += attribute.byte_size();
                attributes.push(attribute);
            }
            Self::Flat { attributes } => attributes.push(attribute),
        }
        Ok(index)
    }

    pub fn attributes(&self) -> &[VertexAttribute] {
        match self {
            Self::Interleaved { attributes, .. } | Self::Flat { attributes } => attributes,
        }
    }

    pub fn get(&self, name: &str) -> Option<&VertexAttribute> {
        self.attributes().iter().find(|a| a.name() == name)
    }

    fn require(&self, name: &str) -> Result<(usize, &VertexAttribute)> {
        self.attributes()
            .iter()
            .enumerate()
            .find(|(_, a)| a.name() == name)
            .ok_or_else(|| RenderError::UnknownAttribute(name.to_owned()))
    }

    pub fn is_interleaved(&self) -> bool {
        matches!(self, Self::Interleaved { .. })
    }

    /// Bytes between consecutive vertices; flat layouts have no single stride
    pub fn stride(&self) -> Option<usize> {
        match self {
            Self::Interleaved { stride, .. } => Some(*stride),
            Self::Flat { .. } => None,
        }
    }

    /// Bytes one vertex occupies across all attributes
    pub fn vertex_size(&self) -> usize {
        self.attributes().iter().map(VertexAttribute::byte_size).sum()
    }

    /// Floats of CPU-side data per vertex
    pub fn floats_per_vertex(&self) -> usize {
        self.attributes()
            .iter()
            .map(VertexAttribute::source_floats)
            .sum()
    }

    /// Stride handed to the attribute pointer of `attribute`
    pub fn element_stride(&self, attribute: &VertexAttribute) -> usize {
        match self {
            Self::Interleaved { stride, .. } => *stride,
            Self::Flat { .. } => attribute.byte_size(),
        }
    }

    /// Byte offset of the attribute's first element in a buffer sized for
    /// `vertex_capacity` vertices
    pub fn offset_of(&self, name: &str, vertex_capacity: usize) -> Result<usize> {
        let (position, _) = self.require(name)?;
        let preceding: usize = self.attributes()[..position]
            .iter()
            .map(VertexAttribute::byte_size)
            .sum();
        Ok(match self {
            Self::Interleaved { .. } => preceding,
            Self::Flat { .. } => preceding * vertex_capacity,
        })
    }

    /// Points the attribute's location at the bound array buffer
    pub fn pointer<A: GraphicsApi>(
        &self,
        ctx: &mut GpuContext<A>,
        name: &str,
        custom_stride: usize,
        byte_offset: usize,
    ) -> Result<()> {
        let (_, attribute) = self.require(name)?;
        let location = attribute.index.unwrap_or_default();
        ctx.vertex_attrib_pointer(location, attribute.format(), custom_stride, byte_offset);
        Ok(())
    }

    pub fn enable<A: GraphicsApi>(&self, ctx: &mut GpuContext<A>, name: &str) -> Result<()> {
        let (_, attribute) = self.require(name)?;
        ctx.enable_vertex_attrib(attribute.index.unwrap_or_default());
        Ok(())
    }

    pub fn disable<A: GraphicsApi>(&self, ctx: &mut GpuContext<A>, name: &str) -> Result<()> {
        let (_, attribute) = self.require(name)?;
        ctx.disable_vertex_attrib(attribute.index.unwrap_or_default());
        Ok(())
    }

    /// Points & enables every attribute against the bound array buffer & vertex array
    pub fn bind_all<A: GraphicsApi>(
        &self,
        ctx: &mut GpuContext<A>,
        vertex_capacity: usize,
    ) -> Result<()> {
        for attribute in self.attributes() {
            let offset = self.offset_of(attribute.name(), vertex_capacity)?;
            self.pointer(ctx, attribute.name(), self.element_stride(attribute), offset)?;
            self.enable(ctx, attribute.name())?;
        }
        Ok(())
    }

    /// Converts CPU-side floats into GPU bytes, appending them to `out`
    ///
    /// Returns the runs to copy into a buffer sized for `vertex_capacity` vertices.
    pub fn encode(
        &self,
        vertex_count: usize,
        data: &[f32],
        vertex_capacity: usize,
        out: &mut Vec<u8>,
    ) -> Result<Vec<EncodedRun>> {
        let floats = self.floats_per_vertex();
        if data.len() != vertex_count * floats {
            return Err(RenderError::VertexDataLength {
                vertex_count,
                expected: vertex_count * floats,
                actual: data.len(),
            });
        }
        let start = out.len();
        out.reserve(vertex_count * self.vertex_size());

        match self {
            Self::Interleaved { attributes, .. } => {
                for vertex in data.chunks_exact(floats.max(1)) {
                    let mut src = vertex;
                    for attribute in attributes {
                        let (head, rest) = src.split_at(attribute.source_floats());
                        attribute.encode(head, out);
                        src = rest;
                    }
                }
                Ok(vec![EncodedRun {
                    dst_offset: 0,
                    src: start..out.len(),
                }])
            }
            Self::Flat { attributes } => {
                let mut runs = Vec::with_capacity(attributes.len());
                let mut src = data;
                for attribute in attributes {
                    let (run, rest) = src.split_at(attribute.source_floats() * vertex_count);
                    let run_start = out.len();
                    for element in run.chunks_exact(attribute.source_floats()) {
                        attribute.encode(element, out);
                    }
                    runs.push(EncodedRun {
                        dst_offset: self.offset_of(attribute.name(), vertex_capacity)?,
                        src: run_start..out.len(),
                    });
                    src = rest;
                }
                Ok(runs)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        Color,
        recording::{Call, RecordingBackend},
    };

    fn sprite_layout() -> VertexLayout {
        VertexLayout::sprite("a_position", "a_color", "a_texCoord0").unwrap()
    }

    #[test]
    fn sprite_layout_is_five_floats_wide() {
        let layout = sprite_layout();

        assert_eq!(layout.stride(), Some(20));
        assert_eq!(layout.floats_per_vertex(), 5);
        assert_eq!(layout.offset_of("a_position", 100).unwrap(), 0);
        assert_eq!(layout.offset_of("a_color", 100).unwrap(), 8);
        assert_eq!(layout.offset_of("a_texCoord0", 100).unwrap(), 12);
        let indices: Vec<_> = layout.attributes().iter().map(|a| a.index()).collect();
        assert_eq!(indices, vec![Some(0), Some(1), Some(2)]);
    }

    #[test]
    fn flat_offsets_follow_whole_runs() {
        let layout = VertexLayout::flat()
            .with(VertexAttribute::position_3d())
            .unwrap()
            .with(VertexAttribute::normal())
            .unwrap();

        assert_eq!(layout.stride(), None);
        assert_eq!(layout.offset_of("a_normal", 10).unwrap(), 120);
        assert_eq!(layout.element_stride(&VertexAttribute::normal()), 12);
    }

    #[test]
    fn automatic_indices_skip_explicit_ones() {
        let mut layout = VertexLayout::interleaved();
        layout
            .add_attribute(VertexAttribute::position_2d().with_index(0))
            .unwrap();
        layout
            .add_attribute(VertexAttribute::normal().with_index(1))
            .unwrap();
        let index = layout
            .add_attribute(VertexAttribute::color_unpacked())
            .unwrap();
        assert_eq!(index, 2);
    }

    #[test]
    fn duplicate_indices_and_names_are_rejected() {
        let mut layout = VertexLayout::interleaved();
        layout
            .add_attribute(VertexAttribute::position_2d().with_index(3))
            .unwrap();

        let err = layout
            .add_attribute(VertexAttribute::normal().with_index(3))
            .unwrap_err();
        assert!(matches!(err, RenderError::DuplicateAttributeIndex(3)));

        let err = layout
            .add_attribute(VertexAttribute::position_3d())
            .unwrap_err();
        assert!(matches!(err, RenderError::DuplicateAttribute(name) if name == "a_position"));
    }

    #[test]
    fn component_count_is_validated() {
        assert!(matches!(
            VertexAttribute::new("a_weird", DataType::Float, 5, false),
            Err(RenderError::InvalidComponentCount(5))
        ));
        assert!(VertexAttribute::new("a_ok", DataType::Short, 4, true).is_ok());
    }

    #[test]
    fn equality_ignores_how_components_are_fed() {
        let manual = VertexAttribute::new(COLOR_ATTRIBUTE, DataType::UnsignedByte, 4, true)
            .unwrap();
        assert_eq!(manual, VertexAttribute::color_packed());
        assert_ne!(
            VertexAttribute::color_packed(),
            VertexAttribute::color_packed().with_index(1)
        );
        assert_eq!(VertexAttribute::color_packed().byte_size(), 4);
    }

    #[test]
    fn unknown_attribute_operations_fail() {
        let layout = sprite_layout();
        let mut ctx = GpuContext::new(RecordingBackend::new());

        assert!(matches!(
            layout.enable(&mut ctx, "a_normal"),
            Err(RenderError::UnknownAttribute(name)) if name == "a_normal"
        ));
        assert!(layout.disable(&mut ctx, "nope").is_err());
        assert!(layout.pointer(&mut ctx, "nope", 20, 0).is_err());
        assert!(ctx.api().calls().is_empty());
    }

    #[test]
    fn bind_all_uses_shared_stride_when_interleaved() {
        let layout = sprite_layout();
        let mut ctx = GpuContext::new(RecordingBackend::new());

        layout.bind_all(&mut ctx, 4).unwrap();

        let pointers: Vec<_> = ctx
            .api()
            .calls()
            .iter()
            .filter_map(|call| match call {
                Call::VertexAttribPointer {
                    location,
                    stride,
                    offset,
                    ..
                } => Some((*location, *stride, *offset)),
                _ => None,
            })
            .collect();
        assert_eq!(pointers, vec![(0, 20, 0), (1, 20, 8), (2, 20, 12)]);
    }

    #[test]
    fn packed_colors_are_copied_bit_for_bit() {
        let layout = sprite_layout();
        let color = Color::rgba(0.25, 0.5, 0.75, 1.0).to_float_bits();
        let mut out = Vec::new();

        let runs = layout
            .encode(1, &[1.0, 2.0, color, 0.5, 0.25], 1, &mut out)
            .unwrap();

        assert_eq!(runs, vec![EncodedRun { dst_offset: 0, src: 0..20 }]);
        assert_eq!(&out[8..12], &color.to_bits().to_le_bytes());
        assert_eq!(&out[0..4], &1.0f32.to_le_bytes());
        assert_eq!(&out[16..20], &0.25f32.to_le_bytes());
    }

    #[test]
    fn normalized_integers_are_scaled() {
        let layout = VertexLayout::interleaved()
            .with(VertexAttribute::new("a_rgba", DataType::UnsignedByte, 4, true).unwrap())
            .unwrap()
            .with(VertexAttribute::new("a_dir", DataType::Short, 2, true).unwrap())
            .unwrap();
        let mut out = Vec::new();

        layout
            .encode(1, &[0.0, 0.5, 1.0, 2.0, -1.0, 1.0], 1, &mut out)
            .unwrap();

        assert_eq!(&out[..4], &[0, 128, 255, 255]);
        assert_eq!(&out[4..6], &(-32767i16).to_le_bytes());
        assert_eq!(&out[6..8], &32767i16.to_le_bytes());
    }

    #[test]
    fn flat_encoding_targets_capacity_offsets() {
        let layout = VertexLayout::flat()
            .with(VertexAttribute::position_2d())
            .unwrap()
            .with(VertexAttribute::new("a_weight", DataType::Float, 1, false).unwrap())
            .unwrap();
        let mut out = Vec::new();

        // two vertices: positions first, then weights
        let runs = layout
            .encode(2, &[1.0, 2.0, 3.0, 4.0, 0.5, 0.75], 8, &mut out)
            .unwrap();

        assert_eq!(
            runs,
            vec![
                EncodedRun { dst_offset: 0, src: 0..16 },
                EncodedRun { dst_offset: 64, src: 16..24 },
            ]
        );
    }

    #[test]
    fn mismatched_data_length_is_an_error() {
        let layout = sprite_layout();
        let mut out = Vec::new();
        let err = layout.encode(2, &[0.0; 9], 2, &mut out).unwrap_err();
        assert!(matches!(
            err,
            RenderError::VertexDataLength {
                vertex_count: 2,
                expected: 10,
                actual: 9
            }
        ));
    }
}
