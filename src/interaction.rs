//! Pointer event routing.
//!
//! Events are dispatched on the controller's mode and on which viewport is
//! under the pointer. Over a slice view in MPR mode a scroll moves the slice
//! and a primary press is swallowed; everywhere else the events drive the
//! free camera of that viewport.

use tracing::{debug, trace};

use crate::enums::{MouseButton, Orientation, ScrollDirection};
use crate::render::{RenderSurface, ViewportId};
use crate::view_manager::MprSession;

/// Zoom per scroll notch in free-camera mode.
const DOLLY_PER_NOTCH: f64 = 1.1 * 1.1;
/// Degrees of rotation for a drag across the whole viewport.
const ROTATION_PER_VIEWPORT: f64 = 20.0;

/// Pointer positions are in surface pixels, origin at the bottom-left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    Scroll {
        position: (f64, f64),
        direction: ScrollDirection,
        /// Fast-scroll modifier key held.
        modifier: bool,
    },
    ButtonPress {
        position: (f64, f64),
        button: MouseButton,
    },
    ButtonRelease {
        position: (f64, f64),
        button: MouseButton,
    },
    PointerMove {
        position: (f64, f64),
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InteractionMode {
    #[default]
    FreeCamera,
    MprSlice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    SliceChanged {
        viewport: ViewportId,
        orientation: Orientation,
        index: usize,
    },
    CameraChanged {
        viewport: ViewportId,
    },
    RotationStarted {
        viewport: ViewportId,
    },
    /// Consumed without visible effect.
    Absorbed,
    Ignored,
}

impl EventOutcome {
    pub fn needs_redraw(&self) -> bool {
        matches!(
            self,
            EventOutcome::SliceChanged { .. } | EventOutcome::CameraChanged { .. }
        )
    }
}

#[derive(Debug, Clone, Copy)]
struct Rotation {
    viewport: ViewportId,
    last: (f64, f64),
}

/// Routes input events by interaction mode and by the viewport under the
/// pointer. In MPR mode a slice view maps to its plane pair and nothing else
/// is kept; the only extra state is the drag in progress of the free-camera
/// rotation, which the MPR mode delegates to the 3D view.
#[derive(Debug, Clone)]
pub struct InteractionController {
    mode: InteractionMode,
    fast_scroll_step: u32,
    rotation: Option<Rotation>,
}

impl InteractionController {
    pub fn new(fast_scroll_step: u32) -> Self {
        Self {
            mode: InteractionMode::FreeCamera,
            fast_scroll_step: fast_scroll_step.max(1),
            rotation: None,
        }
    }

    pub fn mode(&self) -> InteractionMode {
        self.mode
    }

    /// Switching modes drops any drag in progress.
    pub fn set_mode(&mut self, mode: InteractionMode) {
        if self.mode != mode {
            debug!(?mode, "interaction mode");
            self.mode = mode;
            self.rotation = None;
        }
    }

    pub fn is_rotating(&self) -> bool {
        self.rotation.is_some()
    }

    /// Slices moved by one scroll notch.
    pub fn scroll_step(&self, modifier: bool) -> i64 {
        if modifier {
            i64::from(self.fast_scroll_step)
        } else {
            1
        }
    }

    /// Routes `event`. `scene_bounds` is what free-camera clipping ranges are
    /// fitted to; `None` leaves clipping ranges alone.
    pub fn handle<S: RenderSurface>(
        &mut self,
        event: InputEvent,
        surface: &mut S,
        session: Option<&mut MprSession>,
        scene_bounds: Option<[f64; 6]>,
    ) -> EventOutcome {
        let session = session.filter(|_| self.mode == InteractionMode::MprSlice);
        match event {
            InputEvent::Scroll {
                position,
                direction,
                modifier,
            } => {
                let Some(viewport) = surface.viewport_at(position.0, position.1) else {
                    return EventOutcome::Ignored;
                };
                if let Some(session) = session {
                    if let Some(pair) = session.pair_for_viewport(viewport) {
                        let orientation = pair.orientation();
                        let target = pair.base_slice_index() as i64
                            + self.scroll_step(modifier) * direction.sign();
                        if let Some(index) = session.set_slice_index(surface, viewport, target) {
                            return EventOutcome::SliceChanged {
                                viewport,
                                orientation,
                                index,
                            };
                        }
                    }
                }
                self.zoom(surface, viewport, direction, scene_bounds)
            }
            InputEvent::ButtonPress {
                position,
                button: MouseButton::Primary,
            } => {
                let Some(viewport) = surface.viewport_at(position.0, position.1) else {
                    return EventOutcome::Ignored;
                };
                if session.is_some_and(|s| s.pair_for_viewport(viewport).is_some()) {
                    trace!(?viewport, "press over slice view absorbed");
                    return EventOutcome::Absorbed;
                }
                self.rotation = Some(Rotation {
                    viewport,
                    last: position,
                });
                EventOutcome::RotationStarted { viewport }
            }
            InputEvent::ButtonRelease {
                button: MouseButton::Primary,
                ..
            } => match self.rotation.take() {
                Some(_) => EventOutcome::Absorbed,
                None => EventOutcome::Ignored,
            },
            InputEvent::PointerMove { position } => self.rotate(surface, position, scene_bounds),
            InputEvent::ButtonPress { .. } | InputEvent::ButtonRelease { .. } => {
                EventOutcome::Ignored
            }
        }
    }

    fn zoom<S: RenderSurface>(
        &self,
        surface: &mut S,
        viewport: ViewportId,
        direction: ScrollDirection,
        scene_bounds: Option<[f64; 6]>,
    ) -> EventOutcome {
        let Some(vp) = surface.viewport_mut(viewport) else {
            return EventOutcome::Ignored;
        };
        let factor = match direction {
            ScrollDirection::Forward => DOLLY_PER_NOTCH,
            ScrollDirection::Backward => DOLLY_PER_NOTCH.recip(),
        };
        vp.camera.dolly(factor);
        if let Some(bounds) = scene_bounds {
            vp.camera.reset_clipping_range(bounds);
        }
        EventOutcome::CameraChanged { viewport }
    }

    fn rotate<S: RenderSurface>(
        &mut self,
        surface: &mut S,
        position: (f64, f64),
        scene_bounds: Option<[f64; 6]>,
    ) -> EventOutcome {
        let Some(rotation) = &mut self.rotation else {
            return EventOutcome::Ignored;
        };
        let viewport = rotation.viewport;
        let (dx, dy) = (position.0 - rotation.last.0, position.1 - rotation.last.1);
        rotation.last = position;

        let size = surface.size();
        let Some(vp) = surface.viewport_mut(viewport) else {
            self.rotation = None;
            return EventOutcome::Ignored;
        };
        let (width, height) = vp.rect.pixel_size(size);
        if width <= 0.0 || height <= 0.0 {
            return EventOutcome::Absorbed;
        }
        vp.camera.azimuth(-dx * ROTATION_PER_VIEWPORT / width);
        vp.camera.elevation(-dy * ROTATION_PER_VIEWPORT / height);
        vp.camera.orthogonalize_view_up();
        if let Some(bounds) = scene_bounds {
            vp.camera.reset_clipping_range(bounds);
        }
        EventOutcome::CameraChanged { viewport }
    }
}
