//! CPU-side mirror of buffer contents & vertex array state
//!
//! Shared by the backends that can't (or don't want to) ask a driver for this: the recording
//! backend inspects it after the fact, the wgpu backend copies draw inputs out of it.
//! Misuse comes back as `Err(message)` for the backend to report its own way.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::gpu::{AttributeFormat, BufferId, BufferTarget, IndexType, VertexArrayId};

/// Where one attribute location reads its data from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct AttribPointer {
    pub buffer: BufferId,
    pub format: AttributeFormat,
    pub stride: usize,
    pub offset: usize,
}

impl AttribPointer {
    /// Bytes between consecutive elements; GL treats a stride of 0 as tightly packed
    pub fn effective_stride(&self) -> usize {
        match self.stride {
            0 => self.format.data_type.size() * self.format.count as usize,
            stride => stride,
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct VertexArrayRecord {
    pub pointers: BTreeMap<u32, AttribPointer>,
    pub enabled: BTreeSet<u32>,
    pub element_buffer: Option<BufferId>,
}

impl VertexArrayRecord {
    /// Enabled locations & their pointers, lowest location first
    pub fn active_pointers(&self) -> impl Iterator<Item = (u32, AttribPointer)> + '_ {
        self.enabled
            .iter()
            .filter_map(|location| Some((*location, *self.pointers.get(location)?)))
    }
}

type Checked = std::result::Result<(), String>;

pub(crate) struct Shadow {
    next_id: u32,
    buffers: HashMap<BufferId, Vec<u8>>,
    array_buffer: Option<BufferId>,
    vertex_arrays: HashMap<VertexArrayId, VertexArrayRecord>,
    vertex_array: Option<VertexArrayId>,
}

impl Default for Shadow {
    fn default() -> Self {
        Self {
            next_id: 1,
            buffers: HashMap::new(),
            array_buffer: None,
            vertex_arrays: HashMap::new(),
            vertex_array: None,
        }
    }
}

impl Shadow {
    /// Hands out ids for every kind of object, so ids are unique across kinds
    pub fn next_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn buffer(&self, buffer: BufferId) -> Option<&[u8]> {
        self.buffers.get(&buffer).map(Vec::as_slice)
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn bound_vertex_array(&self) -> Option<(VertexArrayId, &VertexArrayRecord)> {
        let id = self.vertex_array?;
        Some((id, self.vertex_arrays.get(&id)?))
    }

    fn bound_vertex_array_mut(&mut self) -> Option<&mut VertexArrayRecord> {
        self.vertex_arrays.get_mut(&self.vertex_array?)
    }

    pub fn bound_buffer(&self, target: BufferTarget) -> Option<BufferId> {
        match target {
            BufferTarget::Array => self.array_buffer,
            BufferTarget::ElementArray => self.bound_vertex_array()?.1.element_buffer,
        }
    }

    pub fn create_buffer(&mut self) -> BufferId {
        let buffer = BufferId(self.next_id());
        self.buffers.insert(buffer, Vec::new());
        buffer
    }

    pub fn delete_buffer(&mut self, buffer: BufferId) -> Checked {
        if self.array_buffer == Some(buffer) {
            self.array_buffer = None;
        }
        self.buffers
            .remove(&buffer)
            .map(drop)
            .ok_or_else(|| format!("delete of unknown buffer {buffer:?}"))
    }

    pub fn bind_buffer(&mut self, target: BufferTarget, buffer: Option<BufferId>) -> Checked {
        match target {
            BufferTarget::Array => {
                self.array_buffer = buffer;
                Ok(())
            }
            BufferTarget::ElementArray => match self.bound_vertex_array_mut() {
                Some(vao) => {
                    vao.element_buffer = buffer;
                    Ok(())
                }
                None => Err("element buffer bound without a vertex array".into()),
            },
        }
    }

    pub fn buffer_data(&mut self, target: BufferTarget, data: &[u8]) -> Checked {
        let contents = self
            .bound_buffer(target)
            .and_then(|b| self.buffers.get_mut(&b))
            .ok_or_else(|| format!("buffer_data with nothing bound to {target:?}"))?;
        *contents = data.to_vec();
        Ok(())
    }

    pub fn buffer_sub_data(&mut self, target: BufferTarget, offset: usize, data: &[u8]) -> Checked {
        let contents = self
            .bound_buffer(target)
            .and_then(|b| self.buffers.get_mut(&b))
            .ok_or_else(|| format!("buffer_sub_data with nothing bound to {target:?}"))?;
        let size = contents.len();
        let range = contents.get_mut(offset..offset + data.len()).ok_or_else(|| {
            format!(
                "buffer_sub_data of {} bytes at {offset} overflows {size} byte buffer",
                data.len()
            )
        })?;
        range.copy_from_slice(data);
        Ok(())
    }

    pub fn create_vertex_array(&mut self) -> VertexArrayId {
        let vao = VertexArrayId(self.next_id());
        self.vertex_arrays.insert(vao, VertexArrayRecord::default());
        vao
    }

    pub fn delete_vertex_array(&mut self, vertex_array: VertexArrayId) {
        self.vertex_arrays.remove(&vertex_array);
        if self.vertex_array == Some(vertex_array) {
            self.vertex_array = None;
        }
    }

    pub fn bind_vertex_array(&mut self, vertex_array: Option<VertexArrayId>) {
        self.vertex_array = vertex_array;
    }

    pub fn vertex_attrib_pointer(
        &mut self,
        location: u32,
        format: AttributeFormat,
        stride: usize,
        offset: usize,
    ) -> Checked {
        let buffer = self
            .array_buffer
            .ok_or_else(|| format!("attribute {location} pointed at no array buffer"))?;
        let vao = self
            .bound_vertex_array_mut()
            .ok_or_else(|| format!("attribute {location} set without a vertex array"))?;
        vao.pointers.insert(
            location,
            AttribPointer {
                buffer,
                format,
                stride,
                offset,
            },
        );
        Ok(())
    }

    pub fn set_vertex_attrib_enabled(&mut self, location: u32, enabled: bool) -> Checked {
        let vao = self
            .bound_vertex_array_mut()
            .ok_or_else(|| format!("attribute {location} toggled without a vertex array"))?;
        if enabled {
            vao.enabled.insert(location);
        } else {
            vao.enabled.remove(&location);
        }
        Ok(())
    }

    /// Indices a draw of `count` indices starting `offset` bytes in would consume
    pub fn read_indices(
        &self,
        count: usize,
        index_type: IndexType,
        offset: usize,
    ) -> std::result::Result<Vec<u32>, String> {
        let bytes = self
            .bound_buffer(BufferTarget::ElementArray)
            .and_then(|b| self.buffers.get(&b))
            .and_then(|bytes| bytes.get(offset..offset + count * index_type.size()))
            .ok_or_else(|| {
                format!("draw of {count} indices at {offset} without enough index data")
            })?;
        Ok(match index_type {
            IndexType::U16 => bytes
                .chunks_exact(2)
                .map(|c| u16::from_le_bytes([c[0], c[1]]) as u32)
                .collect(),
            IndexType::U32 => bytes
                .chunks_exact(4)
                .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect(),
        })
    }
}
