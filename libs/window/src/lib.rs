// This file is part of OpenGMS.
//
// OpenGMS is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// OpenGMS is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with OpenGMS.  If not, see <http://www.gnu.org/licenses/>.

//! Presentation seam: one OS window plus a trivial blit of the CPU
//! backbuffer onto its surface. The simulation never touches any of this;
//! headless runs skip the crate entirely.

use anyhow::{anyhow, Result};
use futures::executor::block_on;
use log::trace;
use std::{collections::HashSet, num::NonZeroU32};
use winit::{
    dpi::PhysicalSize,
    event::{ElementState, Event, KeyboardInput, VirtualKeyCode, WindowEvent},
    event_loop::{ControlFlow, EventLoop},
    platform::run_return::EventLoopExtRunReturn,
    window::WindowBuilder,
};

/// Translate host key codes to the titles' virtual key numbering.
pub fn gm_key(code: VirtualKeyCode) -> Option<u32> {
    Some(match code {
        VirtualKeyCode::Back => 8,
        VirtualKeyCode::Tab => 9,
        VirtualKeyCode::Return | VirtualKeyCode::NumpadEnter => 13,
        VirtualKeyCode::LShift | VirtualKeyCode::RShift => 16,
        VirtualKeyCode::LControl | VirtualKeyCode::RControl => 17,
        VirtualKeyCode::LAlt | VirtualKeyCode::RAlt => 18,
        VirtualKeyCode::Pause => 19,
        VirtualKeyCode::Escape => 27,
        VirtualKeyCode::Space => 32,
        VirtualKeyCode::PageUp => 33,
        VirtualKeyCode::PageDown => 34,
        VirtualKeyCode::End => 35,
        VirtualKeyCode::Home => 36,
        VirtualKeyCode::Left => 37,
        VirtualKeyCode::Up => 38,
        VirtualKeyCode::Right => 39,
        VirtualKeyCode::Down => 40,
        VirtualKeyCode::Insert => 45,
        VirtualKeyCode::Delete => 46,
        VirtualKeyCode::Key0 => 48,
        VirtualKeyCode::Key1 => 49,
        VirtualKeyCode::Key2 => 50,
        VirtualKeyCode::Key3 => 51,
        VirtualKeyCode::Key4 => 52,
        VirtualKeyCode::Key5 => 53,
        VirtualKeyCode::Key6 => 54,
        VirtualKeyCode::Key7 => 55,
        VirtualKeyCode::Key8 => 56,
        VirtualKeyCode::Key9 => 57,
        VirtualKeyCode::A => 65,
        VirtualKeyCode::B => 66,
        VirtualKeyCode::C => 67,
        VirtualKeyCode::D => 68,
        VirtualKeyCode::E => 69,
        VirtualKeyCode::F => 70,
        VirtualKeyCode::G => 71,
        VirtualKeyCode::H => 72,
        VirtualKeyCode::I => 73,
        VirtualKeyCode::J => 74,
        VirtualKeyCode::K => 75,
        VirtualKeyCode::L => 76,
        VirtualKeyCode::M => 77,
        VirtualKeyCode::N => 78,
        VirtualKeyCode::O => 79,
        VirtualKeyCode::P => 80,
        VirtualKeyCode::Q => 81,
        VirtualKeyCode::R => 82,
        VirtualKeyCode::S => 83,
        VirtualKeyCode::T => 84,
        VirtualKeyCode::U => 85,
        VirtualKeyCode::V => 86,
        VirtualKeyCode::W => 87,
        VirtualKeyCode::X => 88,
        VirtualKeyCode::Y => 89,
        VirtualKeyCode::Z => 90,
        VirtualKeyCode::Numpad0 => 96,
        VirtualKeyCode::Numpad1 => 97,
        VirtualKeyCode::Numpad2 => 98,
        VirtualKeyCode::Numpad3 => 99,
        VirtualKeyCode::Numpad4 => 100,
        VirtualKeyCode::Numpad5 => 101,
        VirtualKeyCode::Numpad6 => 102,
        VirtualKeyCode::Numpad7 => 103,
        VirtualKeyCode::Numpad8 => 104,
        VirtualKeyCode::Numpad9 => 105,
        VirtualKeyCode::F1 => 112,
        VirtualKeyCode::F2 => 113,
        VirtualKeyCode::F3 => 114,
        VirtualKeyCode::F4 => 115,
        VirtualKeyCode::F5 => 116,
        VirtualKeyCode::F6 => 117,
        VirtualKeyCode::F7 => 118,
        VirtualKeyCode::F8 => 119,
        VirtualKeyCode::F9 => 120,
        VirtualKeyCode::F10 => 121,
        VirtualKeyCode::F11 => 122,
        VirtualKeyCode::F12 => 123,
        _ => return None,
    })
}

struct Gpu {
    surface: wgpu::Surface,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    pipeline: wgpu::RenderPipeline,
    bind_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    frame_tex: Option<(wgpu::Texture, wgpu::BindGroup, u32, u32)>,
}

struct State {
    held: HashSet<u32>,
    closed: bool,
    resized: Option<PhysicalSize<u32>>,
}

/// The game window: owns the GL-ish context, drains input events, and
/// presents whole frames handed over as RGBA bytes.
pub struct GameWindow {
    event_loop: EventLoop<()>,
    window: winit::window::Window,
    gpu: Gpu,
    state: State,
}

impl GameWindow {
    pub fn new(title: &str, width: u32, height: u32) -> Result<Self> {
        let event_loop = EventLoop::new();
        let window = WindowBuilder::new()
            .with_title(title)
            .with_inner_size(PhysicalSize::new(width, height))
            .build(&event_loop)?;

        let instance = wgpu::Instance::new(wgpu::Backends::all());
        let surface = unsafe { instance.create_surface(&window) };
        let adapter = block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::LowPower,
            force_fallback_adapter: false,
            compatible_surface: Some(&surface),
        }))
        .ok_or_else(|| anyhow!("no compatible graphics adapter"))?;
        let (device, queue) = block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("present"),
                features: wgpu::Features::empty(),
                limits: wgpu::Limits::downlevel_defaults(),
            },
            None,
        ))?;

        let size = window.inner_size();
        let format = surface
            .get_supported_formats(&adapter)
            .first()
            .copied()
            .ok_or_else(|| anyhow!("surface reports no formats"))?;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: wgpu::CompositeAlphaMode::Auto,
        };
        surface.configure(&device, &config);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("blit"),
            source: wgpu::ShaderSource::Wgsl(include_str!("blit.wgsl").into()),
        });
        let bind_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("blit-bind"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::NonFiltering),
                    count: None,
                },
            ],
        });
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("blit-pipeline-layout"),
            bind_group_layouts: &[&bind_layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("blit-pipeline"),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &[],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        });
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("blit-sampler"),
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Ok(Self {
            event_loop,
            window,
            gpu: Gpu {
                surface,
                device,
                queue,
                config,
                pipeline,
                bind_layout,
                sampler,
                frame_tex: None,
            },
            state: State {
                held: HashSet::new(),
                closed: false,
                resized: None,
            },
        })
    }

    /// Drain pending OS events; returns false once the window was closed.
    pub fn pump(&mut self) -> bool {
        let state = &mut self.state;
        self.event_loop.run_return(|event, _, control_flow| {
            *control_flow = ControlFlow::Exit;
            match event {
                Event::WindowEvent { event, .. } => match event {
                    WindowEvent::CloseRequested => state.closed = true,
                    WindowEvent::Resized(size) => state.resized = Some(size),
                    WindowEvent::KeyboardInput {
                        input:
                            KeyboardInput {
                                virtual_keycode: Some(code),
                                state: key_state,
                                ..
                            },
                        ..
                    } => {
                        if let Some(key) = gm_key(code) {
                            match key_state {
                                ElementState::Pressed => {
                                    state.held.insert(key);
                                }
                                ElementState::Released => {
                                    state.held.remove(&key);
                                }
                            }
                        }
                    }
                    _ => {}
                },
                Event::MainEventsCleared => *control_flow = ControlFlow::Exit,
                _ => {}
            }
        });
        if let Some(size) = self.state.resized.take() {
            if size.width > 0 && size.height > 0 {
                self.gpu.config.width = size.width;
                self.gpu.config.height = size.height;
                self.gpu.surface.configure(&self.gpu.device, &self.gpu.config);
            }
        }
        !self.state.closed
    }

    pub fn held_keys(&self) -> &HashSet<u32> {
        &self.state.held
    }

    /// The OS reported framebuffer size, which on HiDPI differs from the
    /// logical window size.
    pub fn framebuffer_size(&self) -> (u32, u32) {
        let size = self.window.inner_size();
        (size.width.max(1), size.height.max(1))
    }

    /// Upload one frame of tightly packed RGBA and swap.
    pub fn present(&mut self, rgba: &[u8], width: u32, height: u32) -> Result<()> {
        let gpu = &mut self.gpu;
        let needs_texture = !matches!(
            &gpu.frame_tex,
            Some((_, _, w, h)) if *w == width && *h == height
        );
        if needs_texture {
            trace!("allocating {}x{} present texture", width, height);
            let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
                label: Some("frame"),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8UnormSrgb,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            });
            let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
            let bind = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("frame-bind"),
                layout: &gpu.bind_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(&view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(&gpu.sampler),
                    },
                ],
            });
            gpu.frame_tex = Some((texture, bind, width, height));
        }
        let (texture, bind, ..) = gpu.frame_tex.as_ref().expect("texture allocated above");

        gpu.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            rgba,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: NonZeroU32::new(4 * width),
                rows_per_image: NonZeroU32::new(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );

        let frame = match gpu.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                gpu.surface.configure(&gpu.device, &gpu.config);
                gpu.surface.get_current_texture()?
            }
            Err(e) => return Err(e.into()),
        };
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("present") });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("blit"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: true,
                    },
                })],
                depth_stencil_attachment: None,
            });
            pass.set_pipeline(&gpu.pipeline);
            pass.set_bind_group(0, bind, &[]);
            pass.draw(0..3, 0..1);
        }
        gpu.queue.submit(Some(encoder.finish()));
        frame.present();
        Ok(())
    }
}
