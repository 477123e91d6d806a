//! Headless [`GraphicsApi`] that records every call instead of talking to a GPU
//!
//! Keeps shadow copies of buffer contents & tracks the state a real driver would hold, so
//! each draw can be inspected afterwards. Handy as a null renderer & for tests.

use std::collections::HashMap;

use glam::Mat4;

use crate::{
    gpu::{
        AttributeFormat, BlendEquation, BlendFunc, BufferId, BufferTarget, BufferUsage,
        GraphicsApi, IndexType, Primitive, ProgramId, TextureId, TextureTarget, VertexArrayId,
    },
    shadow::Shadow,
};

/// One call made against the backend
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreateBuffer(BufferId),
    DeleteBuffer(BufferId),
    BindBuffer(BufferTarget, Option<BufferId>),
    BufferData {
        target: BufferTarget,
        len: usize,
        usage: BufferUsage,
    },
    BufferSubData {
        target: BufferTarget,
        offset: usize,
        len: usize,
    },
    CreateVertexArray(VertexArrayId),
    DeleteVertexArray(VertexArrayId),
    BindVertexArray(Option<VertexArrayId>),
    VertexAttribPointer {
        location: u32,
        format: AttributeFormat,
        stride: usize,
        offset: usize,
    },
    EnableVertexAttrib(u32),
    DisableVertexAttrib(u32),
    CreateProgram(ProgramId),
    DeleteProgram(ProgramId),
    UseProgram(Option<ProgramId>),
    UniformMat4 {
        program: ProgramId,
        name: String,
        value: Mat4,
    },
    UniformI32 {
        program: ProgramId,
        name: String,
        value: i32,
    },
    CreateTexture {
        texture: TextureId,
        width: u32,
        height: u32,
    },
    DeleteTexture(TextureId),
    BindTexture {
        unit: u32,
        target: TextureTarget,
        texture: Option<TextureId>,
    },
    SetBlendEnabled(bool),
    BlendEquationSeparate(BlendEquation, BlendEquation),
    BlendFuncSeparate(BlendFunc),
    DepthMask(bool),
    DrawElements {
        primitive: Primitive,
        count: usize,
        index_type: IndexType,
        offset: usize,
    },
}

/// Snapshot of the pipeline state at the moment of a draw call
#[derive(Debug, Clone, PartialEq)]
pub struct DrawRecord {
    pub primitive: Primitive,
    pub program: Option<ProgramId>,
    pub vertex_array: Option<VertexArrayId>,
    /// Texture bound to unit 0 as a 2D texture
    pub texture: Option<TextureId>,
    pub blend_enabled: bool,
    pub blend_func: BlendFunc,
    pub depth_mask: bool,
    /// Indices consumed by the draw, widened to `u32`
    pub indices: Vec<u32>,
    /// Contents of the buffer feeding the lowest enabled attribute
    pub vertex_data: Vec<u8>,
}

#[derive(Debug, Default)]
struct ProgramRecord {
    vertex_src: String,
    fragment_src: String,
    mat4s: HashMap<String, Mat4>,
    ints: HashMap<String, i32>,
}

pub struct RecordingBackend {
    shadow: Shadow,
    calls: Vec<Call>,
    draws: Vec<DrawRecord>,
    errors: Vec<String>,
    programs: HashMap<ProgramId, ProgramRecord>,
    program: Option<ProgramId>,
    textures: HashMap<TextureId, (u32, u32)>,
    bound_textures: HashMap<(u32, TextureTarget), TextureId>,
    blend_enabled: bool,
    blend_equation: (BlendEquation, BlendEquation),
    blend_func: BlendFunc,
    depth_mask: bool,
    fail_next_program: Option<String>,
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self {
            shadow: Shadow::default(),
            calls: Vec::new(),
            draws: Vec::new(),
            errors: Vec::new(),
            programs: HashMap::new(),
            program: None,
            textures: HashMap::new(),
            bound_textures: HashMap::new(),
            blend_enabled: false,
            blend_equation: (BlendEquation::Add, BlendEquation::Add),
            blend_func: BlendFunc::REPLACE,
            depth_mask: true,
            fail_next_program: None,
        }
    }
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    /// Counts recorded calls matching `pred`
    pub fn count_calls(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|call| pred(call)).count()
    }

    pub fn draws(&self) -> &[DrawRecord] {
        &self.draws
    }

    /// Misuse a real driver would have flagged (out of range uploads, draws without a
    /// vertex array, ..)
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Forgets recorded calls & draws, keeping all resources and bound state
    pub fn clear_calls(&mut self) {
        self.calls.clear();
        self.draws.clear();
    }

    pub fn buffer(&self, buffer: BufferId) -> Option<&[u8]> {
        self.shadow.buffer(buffer)
    }

    pub fn program_sources(&self, program: ProgramId) -> Option<(&str, &str)> {
        self.programs
            .get(&program)
            .map(|p| (p.vertex_src.as_str(), p.fragment_src.as_str()))
    }

    pub fn uniform_mat4(&self, program: ProgramId, name: &str) -> Option<Mat4> {
        self.programs.get(&program)?.mat4s.get(name).copied()
    }

    pub fn uniform_i32(&self, program: ProgramId, name: &str) -> Option<i32> {
        self.programs.get(&program)?.ints.get(name).copied()
    }

    pub fn current_program(&self) -> Option<ProgramId> {
        self.program
    }

    pub fn bound_texture(&self, unit: u32, target: TextureTarget) -> Option<TextureId> {
        self.bound_textures.get(&(unit, target)).copied()
    }

    pub fn blend_enabled(&self) -> bool {
        self.blend_enabled
    }

    pub fn blend_func(&self) -> BlendFunc {
        self.blend_func
    }

    pub fn blend_equation(&self) -> (BlendEquation, BlendEquation) {
        self.blend_equation
    }

    pub fn depth_mask_enabled(&self) -> bool {
        self.depth_mask
    }

    pub fn live_buffers(&self) -> usize {
        self.shadow.live_buffers()
    }

    pub fn live_programs(&self) -> usize {
        self.programs.len()
    }

    /// Makes the next [`create_program`](GraphicsApi::create_program) fail with `log`
    pub fn fail_next_program(&mut self, log: impl Into<String>) {
        self.fail_next_program = Some(log.into());
    }

    fn error(&mut self, message: String) {
        log::warn!("{message}");
        self.errors.push(message);
    }

    fn check(&mut self, result: Result<(), String>) {
        if let Err(message) = result {
            self.error(message);
        }
    }
}

impl GraphicsApi for RecordingBackend {
    fn create_buffer(&mut self) -> BufferId {
        let buffer = self.shadow.create_buffer();
        self.calls.push(Call::CreateBuffer(buffer));
        buffer
    }

    fn delete_buffer(&mut self, buffer: BufferId) {
        self.calls.push(Call::DeleteBuffer(buffer));
        let result = self.shadow.delete_buffer(buffer);
        self.check(result);
    }

    fn bind_buffer(&mut self, target: BufferTarget, buffer: Option<BufferId>) {
        self.calls.push(Call::BindBuffer(target, buffer));
        let result = self.shadow.bind_buffer(target, buffer);
        self.check(result);
    }

    fn buffer_data(&mut self, target: BufferTarget, data: &[u8], usage: BufferUsage) {
        self.calls.push(Call::BufferData {
            target,
            len: data.len(),
            usage,
        });
        let result = self.shadow.buffer_data(target, data);
        self.check(result);
    }

    fn buffer_sub_data(&mut self, target: BufferTarget, offset: usize, data: &[u8]) {
        self.calls.push(Call::BufferSubData {
            target,
            offset,
            len: data.len(),
        });
        let result = self.shadow.buffer_sub_data(target, offset, data);
        self.check(result);
    }

    fn create_vertex_array(&mut self) -> VertexArrayId {
        let vao = self.shadow.create_vertex_array();
        self.calls.push(Call::CreateVertexArray(vao));
        vao
    }

    fn delete_vertex_array(&mut self, vertex_array: VertexArrayId) {
        self.calls.push(Call::DeleteVertexArray(vertex_array));
        self.shadow.delete_vertex_array(vertex_array);
    }

    fn bind_vertex_array(&mut self, vertex_array: Option<VertexArrayId>) {
        self.calls.push(Call::BindVertexArray(vertex_array));
        self.shadow.bind_vertex_array(vertex_array);
    }

    fn vertex_attrib_pointer(
        &mut self,
        location: u32,
        format: AttributeFormat,
        stride: usize,
        offset: usize,
    ) {
        self.calls.push(Call::VertexAttribPointer {
            location,
            format,
            stride,
            offset,
        });
        let result = self
            .shadow
            .vertex_attrib_pointer(location, format, stride, offset);
        self.check(result);
    }

    fn enable_vertex_attrib(&mut self, location: u32) {
        self.calls.push(Call::EnableVertexAttrib(location));
        let result = self.shadow.set_vertex_attrib_enabled(location, true);
        self.check(result);
    }

    fn disable_vertex_attrib(&mut self, location: u32) {
        self.calls.push(Call::DisableVertexAttrib(location));
        let result = self.shadow.set_vertex_attrib_enabled(location, false);
        self.check(result);
    }

    fn create_program(
        &mut self,
        vertex_src: &str,
        fragment_src: &str,
    ) -> Result<ProgramId, String> {
        if let Some(log) = self.fail_next_program.take() {
            return Err(log);
        }
        let program = ProgramId(self.shadow.next_id());
        self.programs.insert(
            program,
            ProgramRecord {
                vertex_src: vertex_src.to_owned(),
                fragment_src: fragment_src.to_owned(),
                ..Default::default()
            },
        );
        self.calls.push(Call::CreateProgram(program));
        Ok(program)
    }

    fn delete_program(&mut self, program: ProgramId) {
        self.calls.push(Call::DeleteProgram(program));
        self.programs.remove(&program);
    }

    fn use_program(&mut self, program: Option<ProgramId>) {
        self.calls.push(Call::UseProgram(program));
        self.program = program;
    }

    fn uniform_mat4(&mut self, program: ProgramId, name: &str, value: &Mat4) {
        self.calls.push(Call::UniformMat4 {
            program,
            name: name.to_owned(),
            value: *value,
        });
        match self.programs.get_mut(&program) {
            Some(p) => {
                p.mat4s.insert(name.to_owned(), *value);
            }
            None => self.error(format!("uniform `{name}` set on unknown program {program:?}")),
        }
    }

    fn uniform_i32(&mut self, program: ProgramId, name: &str, value: i32) {
        self.calls.push(Call::UniformI32 {
            program,
            name: name.to_owned(),
            value,
        });
        match self.programs.get_mut(&program) {
            Some(p) => {
                p.ints.insert(name.to_owned(), value);
            }
            None => self.error(format!("uniform `{name}` set on unknown program {program:?}")),
        }
    }

    fn create_texture(&mut self, width: u32, height: u32, rgba: &[u8]) -> TextureId {
        let texture = TextureId(self.shadow.next_id());
        if let Err(err) = crate::texture::check_pixels(width, height, rgba) {
            self.error(err.to_string());
        }
        self.textures.insert(texture, (width, height));
        self.calls.push(Call::CreateTexture {
            texture,
            width,
            height,
        });
        texture
    }

    fn delete_texture(&mut self, texture: TextureId) {
        self.calls.push(Call::DeleteTexture(texture));
        self.textures.remove(&texture);
        self.bound_textures.retain(|_, bound| *bound != texture);
    }

    fn bind_texture(&mut self, unit: u32, target: TextureTarget, texture: Option<TextureId>) {
        self.calls.push(Call::BindTexture {
            unit,
            target,
            texture,
        });
        match texture {
            Some(texture) => {
                self.bound_textures.insert((unit, target), texture);
            }
            None => {
                self.bound_textures.remove(&(unit, target));
            }
        }
    }

    fn set_blend_enabled(&mut self, enabled: bool) {
        self.calls.push(Call::SetBlendEnabled(enabled));
        self.blend_enabled = enabled;
    }

    fn blend_equation_separate(&mut self, rgb: BlendEquation, alpha: BlendEquation) {
        self.calls.push(Call::BlendEquationSeparate(rgb, alpha));
        self.blend_equation = (rgb, alpha);
    }

    fn blend_func_separate(&mut self, func: BlendFunc) {
        self.calls.push(Call::BlendFuncSeparate(func));
        self.blend_func = func;
    }

    fn depth_mask(&mut self, write: bool) {
        self.calls.push(Call::DepthMask(write));
        self.depth_mask = write;
    }

    fn draw_elements(
        &mut self,
        primitive: Primitive,
        count: usize,
        index_type: IndexType,
        offset: usize,
    ) {
        self.calls.push(Call::DrawElements {
            primitive,
            count,
            index_type,
            offset,
        });

        let indices = match self.shadow.read_indices(count, index_type, offset) {
            Ok(indices) => indices,
            Err(message) => {
                self.error(message);
                Vec::new()
            }
        };
        let vertex_array = self.shadow.bound_vertex_array();
        let vertex_data = vertex_array
            .and_then(|(_, vao)| vao.active_pointers().next())
            .and_then(|(_, pointer)| self.shadow.buffer(pointer.buffer))
            .map(<[u8]>::to_vec)
            .unwrap_or_default();
        let vertex_array = vertex_array.map(|(id, _)| id);
        if self.program.is_none() {
            self.error("draw without a program in use".into());
        }

        self.draws.push(DrawRecord {
            primitive,
            program: self.program,
            vertex_array,
            texture: self.bound_texture(0, TextureTarget::Texture2D),
            blend_enabled: self.blend_enabled,
            blend_func: self.blend_func,
            depth_mask: self.depth_mask,
            indices,
            vertex_data,
        });
    }
}
