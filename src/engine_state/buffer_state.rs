//! # Buffer State Module
//!
//! This module owns the storage that section geometry is streamed into.
//!
//! ## Key Features
//!
//! * [`GeometrySink`]: the write/grow/submit contract the mesh manager and culler
//!   talk to, independent of where the bytes end up
//! * [`BufferState`]: a `wgpu` implementation backed by named GPU buffers with
//!   usage analytics
//! * [`CpuGeometrySink`]: an in-memory implementation with the same contract, used
//!   when no adapter is available and by tests
//!
//! ## Architecture
//!
//! All section vertices live in one shared vertex buffer and all indices in one
//! shared index buffer. Offsets and sizes are in elements, not bytes. Growing a
//! buffer allocates a larger one and copies the old contents across on the GPU,
//! so existing offsets stay valid.

use std::collections::HashMap;

use log::{debug, info};
use wgpu::{util::DrawIndexedIndirectArgs, Buffer, Device, Queue};

use super::rendering::{culling::DrawList, Vertex};
use crate::{config::EngineConfig, error::GeometryError};

/// Name of the shared section vertex buffer
pub const VERTEX_BUFFER_NAME: &str = "Section Vertex Buffer";
/// Name of the shared section index buffer
pub const INDEX_BUFFER_NAME: &str = "Section Index Buffer";
/// Name of the indirect draw command buffer filled by the culler
pub const INDIRECT_BUFFER_NAME: &str = "Section Indirect Buffer";
/// Name of the per-draw section origin buffer
pub const INSTANCE_BUFFER_NAME: &str = "Section Instance Buffer";

const VERTEX_SIZE: u64 = std::mem::size_of::<Vertex>() as u64;
const INDEX_SIZE: u64 = std::mem::size_of::<u32>() as u64;
const INDIRECT_SIZE: u64 = std::mem::size_of::<DrawIndexedIndirectArgs>() as u64;
const INSTANCE_SIZE: u64 = std::mem::size_of::<[f32; 4]>() as u64;

/// Destination for section geometry and per-frame draw lists.
///
/// Offsets passed to the write methods always lie inside the current capacity;
/// the caller grows the buffer first when it needs more room.
pub trait GeometrySink {
    /// Current vertex buffer capacity in vertices
    fn vertex_capacity(&self) -> u32;
    /// Current index buffer capacity in indices
    fn index_capacity(&self) -> u32;

    fn write_vertices(&mut self, offset: u32, vertices: &[Vertex]);
    fn write_indices(&mut self, offset: u32, indices: &[u32]);

    /// Replaces the vertex buffer with one of `new_capacity` vertices, keeping the
    /// existing contents at the same offsets.
    fn grow_vertex_buffer(&mut self, new_capacity: u32) -> Result<(), GeometryError>;
    /// Index buffer counterpart of [`GeometrySink::grow_vertex_buffer`].
    fn grow_index_buffer(&mut self, new_capacity: u32) -> Result<(), GeometryError>;

    /// Publishes the draw commands produced by the culler for this frame.
    fn submit_draw_list(&mut self, draw_list: &DrawList);
}

/// Analytics data for a GPU buffer
///
/// Tracks memory allocation, usage, and write operations for a buffer
/// to help identify optimization opportunities.
#[derive(Debug, Clone, Copy, Default)]
pub struct BufferAnalytics {
    /// Total memory allocated for the buffer in bytes
    pub allocated_memory: u64,
    /// Highest byte written so far
    pub used_memory: u64,
    /// Number of times the buffer has been written to
    pub times_written: u64,
    /// Number of times the buffer was reallocated to a larger size
    pub times_grown: u64,
}

/// `wgpu` backed geometry storage.
///
/// Buffers are referenced by name (static string) and their usage is tracked
/// for optimization purposes.
pub struct BufferState {
    device: Device,
    queue: Queue,
    buffers: HashMap<&'static str, Buffer>,
    buffer_analytics: HashMap<&'static str, BufferAnalytics>,
    vertex_capacity: u32,
    index_capacity: u32,
    max_draw_count: u32,
}

impl BufferState {
    /// Creates the shared section buffers on `device`.
    pub fn new(
        device: Device,
        queue: Queue,
        vertex_capacity: u32,
        index_capacity: u32,
        max_draw_count: u32,
    ) -> Self {
        let mut buffer_state = Self {
            device,
            queue,
            buffers: HashMap::new(),
            buffer_analytics: HashMap::new(),
            vertex_capacity,
            index_capacity,
            max_draw_count,
        };

        buffer_state.create_buffer(
            VERTEX_BUFFER_NAME,
            vertex_capacity as u64 * VERTEX_SIZE,
            wgpu::BufferUsages::VERTEX
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
        );
        buffer_state.create_buffer(
            INDEX_BUFFER_NAME,
            index_capacity as u64 * INDEX_SIZE,
            wgpu::BufferUsages::INDEX
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
        );
        buffer_state.create_buffer(
            INDIRECT_BUFFER_NAME,
            max_draw_count as u64 * INDIRECT_SIZE,
            wgpu::BufferUsages::INDIRECT | wgpu::BufferUsages::COPY_DST,
        );
        buffer_state.create_buffer(
            INSTANCE_BUFFER_NAME,
            max_draw_count as u64 * INSTANCE_SIZE,
            wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        );

        buffer_state
    }

    /// Requests an adapter and device without a surface and creates the section
    /// buffers sized from `config`.
    pub async fn request_headless(config: &EngineConfig) -> Result<Self, GeometryError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await?;

        let info = adapter.get_info();
        info!("Using adapter {} ({:?})", info.name, info.backend);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Voxel Stream Device"),
                ..Default::default()
            })
            .await?;

        Ok(Self::new(
            device,
            queue,
            config.initial_vertex_capacity,
            config.initial_index_capacity,
            config.max_draw_count,
        ))
    }

    fn create_buffer(&mut self, buffer_name: &'static str, size: u64, usage: wgpu::BufferUsages) {
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(buffer_name),
            size,
            usage,
            mapped_at_creation: false,
        });
        self.buffers.insert(buffer_name, buffer);
        self.buffer_analytics.insert(
            buffer_name,
            BufferAnalytics {
                allocated_memory: size,
                ..Default::default()
            },
        );
    }

    /// Writes raw byte data to a buffer.
    ///
    /// Writes to unknown buffers or past the end of a buffer are dropped.
    fn write_buffer(
        &mut self,
        buffer_name: &'static str,
        offset: wgpu::BufferAddress,
        data: &[u8],
    ) {
        if data.is_empty() {
            return;
        }
        let (Some(buffer), Some(analytics)) = (
            self.buffers.get(buffer_name),
            self.buffer_analytics.get_mut(buffer_name),
        ) else {
            return;
        };

        let end = offset + data.len() as u64;
        if end > analytics.allocated_memory {
            log::error!(
                "Buffer write out of bounds for buffer name '{}' ({} > {})",
                buffer_name,
                end,
                analytics.allocated_memory
            );
            return;
        }

        self.queue.write_buffer(buffer, offset, data);
        analytics.used_memory = analytics.used_memory.max(end);
        analytics.times_written += 1;
    }

    /// Reallocates `buffer_name` at `new_size` bytes and copies the old contents.
    fn grow_buffer(
        &mut self,
        buffer_name: &'static str,
        new_size: u64,
    ) -> Result<(), GeometryError> {
        let limit = self.device.limits().max_buffer_size;
        if new_size > limit {
            return Err(GeometryError::BufferTooLarge {
                buffer: buffer_name,
                requested: new_size,
                limit,
            });
        }
        let Some(old) = self.buffers.get(buffer_name) else {
            return Ok(());
        };

        let new = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(buffer_name),
            size: new_size,
            usage: old.usage(),
            mapped_at_creation: false,
        });

        // Queued writes to the old buffer land before this copy executes.
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Section Buffer Growth"),
            });
        encoder.copy_buffer_to_buffer(old, 0, &new, 0, old.size());
        self.queue.submit(std::iter::once(encoder.finish()));

        debug!(
            "Grew '{}' from {} to {} bytes",
            buffer_name,
            old.size(),
            new_size
        );
        self.buffers.insert(buffer_name, new);
        if let Some(analytics) = self.buffer_analytics.get_mut(buffer_name) {
            analytics.allocated_memory = new_size;
            analytics.times_grown += 1;
        }
        debug!(
            "Geometry buffers hold {} bytes, {} written",
            self.get_total_allocated_memory(),
            self.get_total_used_memory()
        );
        Ok(())
    }

    /// Gets the total allocated memory across all buffers
    pub fn get_total_allocated_memory(&self) -> u64 {
        self.buffer_analytics
            .values()
            .map(|analytics| analytics.allocated_memory)
            .sum()
    }

    /// Gets the total used memory across all buffers
    pub fn get_total_used_memory(&self) -> u64 {
        self.buffer_analytics
            .values()
            .map(|analytics| analytics.used_memory)
            .sum()
    }
}

impl GeometrySink for BufferState {
    fn vertex_capacity(&self) -> u32 {
        self.vertex_capacity
    }

    fn index_capacity(&self) -> u32 {
        self.index_capacity
    }

    fn write_vertices(&mut self, offset: u32, vertices: &[Vertex]) {
        self.write_buffer(
            VERTEX_BUFFER_NAME,
            offset as u64 * VERTEX_SIZE,
            bytemuck::cast_slice(vertices),
        );
    }

    fn write_indices(&mut self, offset: u32, indices: &[u32]) {
        self.write_buffer(
            INDEX_BUFFER_NAME,
            offset as u64 * INDEX_SIZE,
            bytemuck::cast_slice(indices),
        );
    }

    fn grow_vertex_buffer(&mut self, new_capacity: u32) -> Result<(), GeometryError> {
        self.grow_buffer(VERTEX_BUFFER_NAME, new_capacity as u64 * VERTEX_SIZE)?;
        self.vertex_capacity = new_capacity;
        Ok(())
    }

    fn grow_index_buffer(&mut self, new_capacity: u32) -> Result<(), GeometryError> {
        self.grow_buffer(INDEX_BUFFER_NAME, new_capacity as u64 * INDEX_SIZE)?;
        self.index_capacity = new_capacity;
        Ok(())
    }

    fn submit_draw_list(&mut self, draw_list: &DrawList) {
        let count = draw_list.len().min(self.max_draw_count as usize);
        let commands: Vec<u8> = draw_list.commands[..count]
            .iter()
            .flat_map(|command| command.as_bytes().iter().copied())
            .collect();
        self.write_buffer(INDIRECT_BUFFER_NAME, 0, &commands);
        self.write_buffer(
            INSTANCE_BUFFER_NAME,
            0,
            bytemuck::cast_slice(&draw_list.instance_offsets[..count]),
        );
    }
}

/// In-memory [`GeometrySink`] that mirrors exactly what would be on the GPU.
#[derive(Debug, Default, Clone)]
pub struct CpuGeometrySink {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub draw_list: DrawList,
    /// Largest capacity either buffer may grow to, in elements.
    pub max_capacity: Option<u32>,
    pub times_grown: u32,
}

impl CpuGeometrySink {
    pub fn new(vertex_capacity: u32, index_capacity: u32) -> Self {
        let zero = Vertex::new(cgmath::Point3::new(0, 0, 0), 0, 0.0, 0.0, 0.0);
        Self {
            vertices: vec![zero; vertex_capacity as usize],
            indices: vec![0; index_capacity as usize],
            ..Default::default()
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.initial_vertex_capacity, config.initial_index_capacity)
    }

    /// Limits growth of both buffers to `max_capacity` elements.
    pub fn with_max_capacity(mut self, max_capacity: u32) -> Self {
        self.max_capacity = Some(max_capacity);
        self
    }

    fn check_capacity(
        &self,
        buffer: &'static str,
        new_capacity: u32,
        element_size: u64,
    ) -> Result<(), GeometryError> {
        match self.max_capacity {
            Some(limit) if new_capacity > limit => Err(GeometryError::BufferTooLarge {
                buffer,
                requested: new_capacity as u64 * element_size,
                limit: limit as u64 * element_size,
            }),
            _ => Ok(()),
        }
    }

    /// Vertices of one resident section, as the GPU would read them.
    pub fn section_vertices(&self, offset: u32, count: u32) -> &[Vertex] {
        &self.vertices[offset as usize..(offset + count) as usize]
    }

    pub fn section_indices(&self, offset: u32, count: u32) -> &[u32] {
        &self.indices[offset as usize..(offset + count) as usize]
    }
}

impl GeometrySink for CpuGeometrySink {
    fn vertex_capacity(&self) -> u32 {
        self.vertices.len() as u32
    }

    fn index_capacity(&self) -> u32 {
        self.indices.len() as u32
    }

    fn write_vertices(&mut self, offset: u32, vertices: &[Vertex]) {
        let start = offset as usize;
        self.vertices[start..start + vertices.len()].copy_from_slice(vertices);
    }

    fn write_indices(&mut self, offset: u32, indices: &[u32]) {
        let start = offset as usize;
        self.indices[start..start + indices.len()].copy_from_slice(indices);
    }

    fn grow_vertex_buffer(&mut self, new_capacity: u32) -> Result<(), GeometryError> {
        self.check_capacity(VERTEX_BUFFER_NAME, new_capacity, VERTEX_SIZE)?;
        let zero = Vertex::new(cgmath::Point3::new(0, 0, 0), 0, 0.0, 0.0, 0.0);
        self.vertices.resize(new_capacity as usize, zero);
        self.times_grown += 1;
        Ok(())
    }

    fn grow_index_buffer(&mut self, new_capacity: u32) -> Result<(), GeometryError> {
        self.check_capacity(INDEX_BUFFER_NAME, new_capacity, INDEX_SIZE)?;
        self.indices.resize(new_capacity as usize, 0);
        self.times_grown += 1;
        Ok(())
    }

    fn submit_draw_list(&mut self, draw_list: &DrawList) {
        self.draw_list.clone_from(draw_list);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_sink_growth_keeps_contents() {
        let mut sink = CpuGeometrySink::new(4, 6);
        sink.write_indices(0, &[1, 2, 3, 4, 5, 6]);
        sink.grow_index_buffer(12).unwrap();

        assert_eq!(sink.index_capacity(), 12);
        assert_eq!(sink.section_indices(0, 6), &[1, 2, 3, 4, 5, 6]);
        assert_eq!(sink.times_grown, 1);
    }

    #[test]
    fn test_cpu_sink_refuses_to_grow_past_its_limit() {
        let mut sink = CpuGeometrySink::new(4, 4).with_max_capacity(8);
        assert!(sink.grow_vertex_buffer(8).is_ok());
        assert!(matches!(
            sink.grow_vertex_buffer(16),
            Err(GeometryError::BufferTooLarge { buffer: VERTEX_BUFFER_NAME, .. })
        ));
        assert_eq!(sink.vertex_capacity(), 8);
    }
}
