//! Pipeline state cache sitting between renderers & the graphics backend
//!
//! Every renderer shares one [`GpuContext`] which remembers the last program, vertex array,
//! textures, blend & depth state it pushed to the backend and drops calls that would not
//! change anything. The cache only stays truthful while all state changes go through it;
//! after touching the backend directly call [`GpuContext::invalidate`].

use std::collections::HashMap;

use glam::Mat4;

use crate::gpu::{
    AttributeFormat, BlendEquation, BlendFunc, BufferId, BufferTarget, BufferUsage, GraphicsApi,
    IndexType, Primitive, ProgramId, TextureId, TextureTarget, VertexArrayId,
};

/// Last known values; `None` means unknown & forces the next call through
#[derive(Debug, Clone, Default)]
struct StateCache {
    program: Option<Option<ProgramId>>,
    vertex_array: Option<Option<VertexArrayId>>,
    textures: HashMap<(u32, TextureTarget), Option<TextureId>>,
    // whether units missing from `textures` are known to be empty
    textures_known_empty: bool,
    blend_enabled: Option<bool>,
    blend_equation: Option<(BlendEquation, BlendEquation)>,
    blend_func: Option<BlendFunc>,
    depth_mask: Option<bool>,
}

impl StateCache {
    /// What a freshly created context looks like
    fn defaults() -> Self {
        Self {
            program: Some(None),
            vertex_array: Some(None),
            textures: HashMap::new(),
            textures_known_empty: true,
            blend_enabled: Some(false),
            blend_equation: Some((BlendEquation::Add, BlendEquation::Add)),
            blend_func: Some(BlendFunc::REPLACE),
            depth_mask: Some(true),
        }
    }

    fn texture(&self, unit: u32, target: TextureTarget) -> Option<Option<TextureId>> {
        match self.textures.get(&(unit, target)) {
            Some(bound) => Some(*bound),
            None if self.textures_known_empty => Some(None),
            None => None,
        }
    }
}

// Stores `value` & reports whether the backend needs to hear about it
fn replace<T: PartialEq>(slot: &mut Option<T>, value: T) -> bool {
    if slot.as_ref() == Some(&value) {
        return false;
    }
    *slot = Some(value);
    true
}

/// Graphics device plus a cache of the pipeline state last pushed to it
pub struct GpuContext<A: GraphicsApi> {
    api: A,
    cache: StateCache,
    suppressed: u64,
}

impl<A: GraphicsApi> GpuContext<A> {
    /// Wraps a backend that is in its initial state (nothing bound, blending off,
    /// depth writes on)
    pub fn new(api: A) -> Self {
        Self {
            api,
            cache: StateCache::defaults(),
            suppressed: 0,
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Direct backend access
    ///
    /// Pipeline state changed through this reference is invisible to the cache; call
    /// [`invalidate`](Self::invalidate) afterwards.
    pub fn api_mut(&mut self) -> &mut A {
        &mut self.api
    }

    pub fn into_inner(self) -> A {
        self.api
    }

    /// Forgets all cached state so every following mutator reaches the backend
    pub fn invalidate(&mut self) {
        log::debug!("GPU state cache invalidated");
        self.cache = StateCache::default();
    }

    /// Number of calls dropped because they would not have changed anything
    pub fn suppressed_calls(&self) -> u64 {
        self.suppressed
    }

    fn suppress(&mut self, what: &str) {
        self.suppressed += 1;
        log::trace!("skipping redundant {what}");
    }

    pub fn use_program(&mut self, program: Option<ProgramId>) {
        if replace(&mut self.cache.program, program) {
            self.api.use_program(program);
        } else {
            self.suppress("use_program");
        }
    }

    pub fn current_program(&self) -> Option<ProgramId> {
        self.cache.program.flatten()
    }

    pub fn bind_vertex_array(&mut self, vertex_array: Option<VertexArrayId>) {
        if replace(&mut self.cache.vertex_array, vertex_array) {
            self.api.bind_vertex_array(vertex_array);
        } else {
            self.suppress("bind_vertex_array");
        }
    }

    pub fn bind_texture(&mut self, unit: u32, target: TextureTarget, texture: Option<TextureId>) {
        if self.cache.texture(unit, target) == Some(texture) {
            self.suppress("bind_texture");
            return;
        }
        self.cache.textures.insert((unit, target), texture);
        self.api.bind_texture(unit, target, texture);
    }

    pub fn bind_texture_2d(&mut self, unit: u32, texture: TextureId) {
        self.bind_texture(unit, TextureTarget::Texture2D, Some(texture));
    }

    pub fn enable_blend(&mut self) {
        self.set_blend_enabled(true);
    }

    pub fn disable_blend(&mut self) {
        self.set_blend_enabled(false);
    }

    fn set_blend_enabled(&mut self, enabled: bool) {
        if replace(&mut self.cache.blend_enabled, enabled) {
            self.api.set_blend_enabled(enabled);
        } else {
            self.suppress("set_blend_enabled");
        }
    }

    pub fn is_blend_enabled(&self) -> Option<bool> {
        self.cache.blend_enabled
    }

    pub fn blend_equation_separate(&mut self, rgb: BlendEquation, alpha: BlendEquation) {
        if replace(&mut self.cache.blend_equation, (rgb, alpha)) {
            self.api.blend_equation_separate(rgb, alpha);
        } else {
            self.suppress("blend_equation_separate");
        }
    }

    pub fn blend_func_separate(&mut self, func: BlendFunc) {
        if replace(&mut self.cache.blend_func, func) {
            self.api.blend_func_separate(func);
        } else {
            self.suppress("blend_func_separate");
        }
    }

    pub fn depth_mask(&mut self, write: bool) {
        if replace(&mut self.cache.depth_mask, write) {
            self.api.depth_mask(write);
        } else {
            self.suppress("depth_mask");
        }
    }

    // Uncached calls. Deletions patch the cache the way a GL driver resets bindings.

    pub fn create_buffer(&mut self) -> BufferId {
        self.api.create_buffer()
    }

    pub fn delete_buffer(&mut self, buffer: BufferId) {
        self.api.delete_buffer(buffer);
    }

    pub fn bind_buffer(&mut self, target: BufferTarget, buffer: Option<BufferId>) {
        self.api.bind_buffer(target, buffer);
    }

    pub fn buffer_data(&mut self, target: BufferTarget, data: &[u8], usage: BufferUsage) {
        self.api.buffer_data(target, data, usage);
    }

    pub fn buffer_sub_data(&mut self, target: BufferTarget, offset: usize, data: &[u8]) {
        self.api.buffer_sub_data(target, offset, data);
    }

    pub fn create_vertex_array(&mut self) -> VertexArrayId {
        self.api.create_vertex_array()
    }

    pub fn delete_vertex_array(&mut self, vertex_array: VertexArrayId) {
        self.api.delete_vertex_array(vertex_array);
        if self.cache.vertex_array == Some(Some(vertex_array)) {
            self.cache.vertex_array = Some(None);
        }
    }

    pub fn vertex_attrib_pointer(
        &mut self,
        location: u32,
        format: AttributeFormat,
        stride: usize,
        offset: usize,
    ) {
        self.api.vertex_attrib_pointer(location, format, stride, offset);
    }

    pub fn enable_vertex_attrib(&mut self, location: u32) {
        self.api.enable_vertex_attrib(location);
    }

    pub fn disable_vertex_attrib(&mut self, location: u32) {
        self.api.disable_vertex_attrib(location);
    }

    pub fn create_program(
        &mut self,
        vertex_src: &str,
        fragment_src: &str,
    ) -> Result<ProgramId, String> {
        self.api.create_program(vertex_src, fragment_src)
    }

    pub fn delete_program(&mut self, program: ProgramId) {
        self.api.delete_program(program);
        // ids may be recycled, so a deleted program can't be trusted as "current"
        if self.cache.program == Some(Some(program)) {
            self.cache.program = None;
        }
    }

    pub fn uniform_mat4(&mut self, program: ProgramId, name: &str, value: &Mat4) {
        self.api.uniform_mat4(program, name, value);
    }

    pub fn uniform_i32(&mut self, program: ProgramId, name: &str, value: i32) {
        self.api.uniform_i32(program, name, value);
    }

    pub fn create_texture(&mut self, width: u32, height: u32, rgba: &[u8]) -> TextureId {
        self.api.create_texture(width, height, rgba)
    }

    pub fn delete_texture(&mut self, texture: TextureId) {
        self.api.delete_texture(texture);
        for bound in self.cache.textures.values_mut() {
            if *bound == Some(texture) {
                *bound = None;
            }
        }
    }

    pub fn draw_elements(
        &mut self,
        primitive: Primitive,
        count: usize,
        index_type: IndexType,
        offset: usize,
    ) {
        self.api.draw_elements(primitive, count, index_type, offset);
    }
}
