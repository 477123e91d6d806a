use crate::{
    error::Result,
    gpu::{
        BufferId, BufferTarget, BufferUsage, GraphicsApi, IndexType, Primitive, VertexArrayId,
    },
    state::GpuContext,
    vertex::VertexLayout,
};

/// GPU vertex + index buffers bound together by a vertex array
///
/// Buffers only ever grow: uploads that fit the current allocation are written in place,
/// larger ones reallocate. The layout is fixed for the model's lifetime.
pub struct Model {
    vertex_array: VertexArrayId,
    vertex_buffer: BufferId,
    index_buffer: BufferId,
    layout: VertexLayout,
    usage: BufferUsage,
    primitive: Primitive,
    vertex_count: usize,
    vertex_capacity: usize,
    index_count: usize,
    index_capacity: usize,
    index_limit: Option<usize>,
    // reused between uploads to avoid reallocating the byte staging area
    scratch: Vec<u8>,
}

impl Model {
    /// Creates a model meant for frequent updates
    pub fn new<A: GraphicsApi>(
        ctx: &mut GpuContext<A>,
        layout: VertexLayout,
        initial_vertex_count: usize,
        initial_index_count: usize,
    ) -> Result<Self> {
        Self::with_usage(
            ctx,
            layout,
            initial_vertex_count,
            initial_index_count,
            BufferUsage::Dynamic,
        )
    }

    /// Reserves storage for the given counts & points the vertex array at it
    pub fn with_usage<A: GraphicsApi>(
        ctx: &mut GpuContext<A>,
        layout: VertexLayout,
        initial_vertex_count: usize,
        initial_index_count: usize,
        usage: BufferUsage,
    ) -> Result<Self> {
        let vertex_array = ctx.create_vertex_array();
        let vertex_buffer = ctx.create_buffer();
        let index_buffer = ctx.create_buffer();

        ctx.bind_vertex_array(Some(vertex_array));
        ctx.bind_buffer(BufferTarget::Array, Some(vertex_buffer));
        ctx.buffer_data(
            BufferTarget::Array,
            &vec![0; initial_vertex_count * layout.vertex_size()],
            usage,
        );
        layout.bind_all(ctx, initial_vertex_count)?;
        ctx.bind_buffer(BufferTarget::ElementArray, Some(index_buffer));
        ctx.buffer_data(
            BufferTarget::ElementArray,
            &vec![0; initial_index_count * IndexType::U32.size()],
            usage,
        );
        ctx.bind_vertex_array(None);

        log::debug!(
            "Model created: {initial_vertex_count} vertices x {} bytes, {initial_index_count} indices",
            layout.vertex_size()
        );

        Ok(Self {
            vertex_array,
            vertex_buffer,
            index_buffer,
            layout,
            usage,
            primitive: Primitive::Triangles,
            vertex_count: 0,
            vertex_capacity: initial_vertex_count,
            index_count: 0,
            index_capacity: initial_index_count,
            index_limit: None,
            scratch: Vec::new(),
        })
    }

    pub fn layout(&self) -> &VertexLayout {
        &self.layout
    }

    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    pub fn vertex_capacity(&self) -> usize {
        self.vertex_capacity
    }

    pub fn index_count(&self) -> usize {
        self.index_count
    }

    pub fn index_capacity(&self) -> usize {
        self.index_capacity
    }

    pub fn primitive(&self) -> Primitive {
        self.primitive
    }

    pub fn set_primitive(&mut self, primitive: Primitive) {
        self.primitive = primitive;
    }

    /// Uploads `vertex_count` vertices of CPU-side floats arranged per the layout
    pub fn set_vertices<A: GraphicsApi>(
        &mut self,
        ctx: &mut GpuContext<A>,
        vertex_count: usize,
        data: &[f32],
    ) -> Result<()> {
        let grow = vertex_count > self.vertex_capacity;
        let capacity = vertex_count.max(self.vertex_capacity);

        self.scratch.clear();
        let runs = self
            .layout
            .encode(vertex_count, data, capacity, &mut self.scratch)?;

        ctx.bind_buffer(BufferTarget::Array, Some(self.vertex_buffer));
        if grow {
            // capacity == vertex_count, so the runs cover the whole new buffer
            ctx.buffer_data(BufferTarget::Array, &self.scratch, self.usage);
            self.vertex_capacity = vertex_count;
            if !self.layout.is_interleaved() {
                // flat run offsets depend on the capacity
                ctx.bind_vertex_array(Some(self.vertex_array));
                self.layout.bind_all(ctx, capacity)?;
                ctx.bind_vertex_array(None);
            }
            log::debug!("Model vertex buffer grown to {vertex_count} vertices");
        } else {
            for run in runs.into_iter().filter(|run| !run.src.is_empty()) {
                ctx.buffer_sub_data(BufferTarget::Array, run.dst_offset, &self.scratch[run.src]);
            }
        }

        self.vertex_count = vertex_count;
        Ok(())
    }

    /// Uploads the index buffer, reallocating only when it outgrows the current storage
    pub fn set_indices<A: GraphicsApi>(&mut self, ctx: &mut GpuContext<A>, indices: &[u32]) {
        ctx.bind_vertex_array(Some(self.vertex_array));
        ctx.bind_buffer(BufferTarget::ElementArray, Some(self.index_buffer));
        let bytes: &[u8] = bytemuck::cast_slice(indices);
        if indices.len() > self.index_capacity {
            ctx.buffer_data(BufferTarget::ElementArray, bytes, self.usage);
            self.index_capacity = indices.len();
            log::debug!("Model index buffer grown to {} indices", indices.len());
        } else if !bytes.is_empty() {
            ctx.buffer_sub_data(BufferTarget::ElementArray, 0, bytes);
        }
        ctx.bind_vertex_array(None);
        self.index_count = indices.len();
    }

    /// Restricts the next draws to the first `limit` indices; `None` draws all of them
    pub fn set_index_count_limit(&mut self, limit: Option<usize>) {
        self.index_limit = limit;
    }

    /// Indices the next [`render`](Self::render) will draw
    pub fn draw_count(&self) -> usize {
        self.index_limit
            .map_or(self.index_count, |limit| limit.min(self.index_count))
    }

    pub fn render<A: GraphicsApi>(&self, ctx: &mut GpuContext<A>) {
        self.render_range(ctx, 0, self.draw_count());
    }

    /// Draws `count` indices starting at index `offset`
    pub fn render_range<A: GraphicsApi>(
        &self,
        ctx: &mut GpuContext<A>,
        offset: usize,
        count: usize,
    ) {
        if count == 0 {
            return;
        }
        ctx.bind_vertex_array(Some(self.vertex_array));
        ctx.draw_elements(
            self.primitive,
            count,
            IndexType::U32,
            offset * IndexType::U32.size(),
        );
        ctx.bind_vertex_array(None);
    }

    /// Releases the buffers & vertex array
    pub fn close<A: GraphicsApi>(self, ctx: &mut GpuContext<A>) {
        ctx.delete_vertex_array(self.vertex_array);
        ctx.delete_buffer(self.vertex_buffer);
        ctx.delete_buffer(self.index_buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        recording::{Call, RecordingBackend},
        vertex::VertexAttribute,
    };

    fn layout() -> VertexLayout {
        VertexLayout::sprite("a_position", "a_color", "a_texCoord0").unwrap()
    }

    fn context() -> GpuContext<RecordingBackend> {
        GpuContext::new(RecordingBackend::new())
    }

    fn quad(count: usize) -> Vec<f32> {
        vec![1.0; count * 5]
    }

    fn uploads(ctx: &GpuContext<RecordingBackend>) -> Vec<Call> {
        ctx.api()
            .calls()
            .iter()
            .filter(|c| matches!(c, Call::BufferData { .. } | Call::BufferSubData { .. }))
            .cloned()
            .collect()
    }

    #[test]
    fn construction_reserves_dynamic_storage() {
        let mut ctx = context();
        let model = Model::new(&mut ctx, layout(), 8, 12).unwrap();

        assert_eq!(
            uploads(&ctx),
            vec![
                Call::BufferData {
                    target: BufferTarget::Array,
                    len: 160,
                    usage: BufferUsage::Dynamic,
                },
                Call::BufferData {
                    target: BufferTarget::ElementArray,
                    len: 48,
                    usage: BufferUsage::Dynamic,
                },
            ]
        );
        assert_eq!(model.vertex_capacity(), 8);
        assert_eq!(model.index_capacity(), 12);
        assert!(ctx.api().errors().is_empty());
    }

    #[test]
    fn uploads_within_capacity_update_in_place() {
        let mut ctx = context();
        let mut model = Model::new(&mut ctx, layout(), 8, 0).unwrap();
        ctx.api_mut().clear_calls();

        model.set_vertices(&mut ctx, 8, &quad(8)).unwrap();
        model.set_vertices(&mut ctx, 4, &quad(4)).unwrap();

        assert_eq!(
            uploads(&ctx),
            vec![
                Call::BufferSubData {
                    target: BufferTarget::Array,
                    offset: 0,
                    len: 160,
                },
                Call::BufferSubData {
                    target: BufferTarget::Array,
                    offset: 0,
                    len: 80,
                },
            ]
        );
        assert_eq!(model.vertex_count(), 4);
        assert_eq!(model.vertex_capacity(), 8);
    }

    #[test]
    fn growing_reallocates_and_never_shrinks() {
        let mut ctx = context();
        let mut model = Model::new(&mut ctx, layout(), 4, 0).unwrap();
        ctx.api_mut().clear_calls();

        model.set_vertices(&mut ctx, 12, &quad(12)).unwrap();
        model.set_vertices(&mut ctx, 2, &quad(2)).unwrap();

        let calls = uploads(&ctx);
        assert!(matches!(calls[0], Call::BufferData { len: 240, .. }));
        assert!(matches!(calls[1], Call::BufferSubData { len: 40, .. }));
        assert_eq!(model.vertex_capacity(), 12);
        assert!(ctx.api().errors().is_empty());
    }

    #[test]
    fn index_uploads_follow_the_same_policy() {
        let mut ctx = context();
        let mut model = Model::new(&mut ctx, layout(), 4, 6).unwrap();
        ctx.api_mut().clear_calls();

        model.set_indices(&mut ctx, &[0, 1, 2, 2, 3, 0]);
        model.set_indices(&mut ctx, &[0; 12]);

        let calls = uploads(&ctx);
        assert!(matches!(calls[0], Call::BufferSubData { len: 24, .. }));
        assert!(matches!(calls[1], Call::BufferData { len: 48, .. }));
        assert_eq!(model.index_capacity(), 12);
    }

    #[test]
    fn index_limit_caps_the_draw() {
        let mut ctx = context();
        let mut model = Model::new(&mut ctx, layout(), 8, 12).unwrap();
        model.set_vertices(&mut ctx, 8, &quad(8)).unwrap();
        model.set_indices(&mut ctx, &[0, 1, 2, 2, 3, 0, 4, 5, 6, 6, 7, 4]);
        let program = ctx.create_program("vs", "fs").ok();
        ctx.use_program(program);

        model.set_index_count_limit(Some(6));
        model.render(&mut ctx);
        model.set_index_count_limit(Some(100));
        model.render(&mut ctx);
        model.set_index_count_limit(None);
        model.render(&mut ctx);

        let counts: Vec<_> = ctx.api().draws().iter().map(|d| d.indices.len()).collect();
        assert_eq!(counts, vec![6, 12, 12]);
        assert_eq!(ctx.api().draws()[0].indices, vec![0, 1, 2, 2, 3, 0]);
        assert!(ctx.api().errors().is_empty());
    }

    #[test]
    fn empty_models_draw_nothing() {
        let mut ctx = context();
        let model = Model::new(&mut ctx, layout(), 4, 6).unwrap();
        model.render(&mut ctx);
        assert!(ctx.api().draws().is_empty());
    }

    #[test]
    fn flat_models_repoint_attributes_when_growing() {
        let mut ctx = context();
        let flat = VertexLayout::flat()
            .with(VertexAttribute::position_2d())
            .unwrap()
            .with(VertexAttribute::tex_coords(0))
            .unwrap();
        let mut model = Model::with_usage(&mut ctx, flat, 2, 0, BufferUsage::Static).unwrap();
        ctx.api_mut().clear_calls();

        model.set_vertices(&mut ctx, 4, &[0.0; 16]).unwrap();

        let offsets: Vec<_> = ctx
            .api()
            .calls()
            .iter()
            .filter_map(|c| match c {
                Call::VertexAttribPointer { stride, offset, .. } => Some((*stride, *offset)),
                _ => None,
            })
            .collect();
        assert_eq!(offsets, vec![(8, 0), (8, 32)]);
    }

    #[test]
    fn close_releases_everything() {
        let mut ctx = context();
        let model = Model::new(&mut ctx, layout(), 4, 6).unwrap();
        model.close(&mut ctx);
        assert_eq!(ctx.api().live_buffers(), 0);
    }
}
