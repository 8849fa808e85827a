// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Interaction controller
//!
//! [`handle_event`] maps an input event and the current state to the next
//! state plus a list of [`Effect`]s. It mutates only the engine context;
//! drawing, object creation and messages are left to the host.

use crate::context::{BoundingVolume, EngineContext, VolumeKind};
use crate::coplanar::{adjust_angle, angle_preset, grow_coplanar_region};
use crate::marking::Invalidation;
use crate::raycast::{cycle_edge, place_cursor, FaceHit};
use crate::snap::{
    adjust_snap_threshold, resolve_point_location, snap_to_nearest_element, SnapKind, SnapMode,
    SnapSource,
};
use cursorbox_model::{Ray, ReferenceFrame, SceneQuery, Viewport};
use nalgebra::Point2;
use std::time::Instant;

/// Where the pointer interaction currently is
#[derive(Clone, Debug, Default, PartialEq)]
pub enum InteractionState {
    #[default]
    Idle,
    /// Pointer over a face, cursor previewed on its first edge
    Hovering { hit: FaceHit, edge_index: usize },
    /// Edge chosen by scrolling
    EdgeSelected { hit: FaceHit, edge_index: usize },
    /// Cursor placed
    Committed { frame: ReferenceFrame },
}

impl InteractionState {
    fn hover(&self) -> Option<(&FaceHit, usize)> {
        match self {
            InteractionState::Hovering { hit, edge_index }
            | InteractionState::EdgeSelected { hit, edge_index } => Some((hit, *edge_index)),
            _ => None,
        }
    }
}

/// Input the host forwards to the controller
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    PointerMove {
        ray: Ray,
        mouse: Point2<f64>,
        now: Instant,
    },
    ScrollEdge {
        forward: bool,
    },
    /// Primary click; `commit_cursor` places the cursor instead of marking
    Click {
        ray: Ray,
        mouse: Point2<f64>,
        now: Instant,
        commit_cursor: bool,
    },
    Snap {
        mode: SnapMode,
        mouse: Point2<f64>,
    },
    TogglePointMode,
    ToggleCoplanar,
    ToggleLimitPlane,
    AnglePreset(usize),
    AdjustAngle {
        increase: bool,
        fine: bool,
    },
    AdjustSnapThreshold {
        increase: bool,
    },
    SetPush(f64),
    SetPreview(Option<VolumeKind>),
    FitCursor,
    Create(VolumeKind),
    Clear,
    Cancel,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReportLevel {
    Info,
    Warning,
}

/// Work the host performs after a transition
#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    Redraw,
    Invalidate(Invalidation),
    PlaceCursor(ReferenceFrame),
    /// Replace the preview volume; `None` hides it
    Preview(Option<BoundingVolume>),
    CreateVolume(BoundingVolume),
    Report { level: ReportLevel, message: String },
    Exit,
}

impl Effect {
    fn info(message: impl Into<String>) -> Self {
        Effect::Report {
            level: ReportLevel::Info,
            message: message.into(),
        }
    }

    fn warning(message: impl Into<String>) -> Self {
        Effect::Report {
            level: ReportLevel::Warning,
            message: message.into(),
        }
    }
}

/// Advance the interaction by one event
pub fn handle_event(
    state: InteractionState,
    event: Event,
    ctx: &mut EngineContext,
    scene: &dyn SceneQuery,
    viewport: &dyn Viewport,
) -> (InteractionState, Vec<Effect>) {
    let mut effects: Vec<Effect> = ctx
        .marking
        .prune_stale(scene)
        .into_iter()
        .map(Effect::Invalidate)
        .collect();
    let marks_changed = !effects.is_empty();

    let next = match event {
        Event::PointerMove { ray, mouse, now } => {
            let keep = state.hover().map(|(hit, edge)| (hit.object, hit.face_index, edge));
            match ctx.resolver_mut().resolve(&ray, mouse, now, scene) {
                Some(hit) => {
                    let same_face = keep.filter(|(o, f, _)| *o == hit.object && *f == hit.face_index);
                    let next = match (&state, same_face) {
                        (InteractionState::EdgeSelected { .. }, Some((_, _, edge))) => {
                            InteractionState::EdgeSelected { hit, edge_index: edge }
                        }
                        _ => InteractionState::Hovering { hit, edge_index: 0 },
                    };
                    if let Some((hit, edge)) = next.hover() {
                        effects.push(Effect::PlaceCursor(place_cursor(hit, edge)));
                    }
                    effects.push(Effect::Redraw);
                    next
                }
                None => {
                    if state.hover().is_some() {
                        effects.push(Effect::Redraw);
                        InteractionState::Idle
                    } else {
                        state
                    }
                }
            }
        }

        Event::ScrollEdge { forward } => match state.hover() {
            Some((hit, edge)) => {
                let edge_index = cycle_edge(edge, hit.edges.len(), forward);
                let hit = hit.clone();
                effects.push(Effect::PlaceCursor(place_cursor(&hit, edge_index)));
                effects.push(Effect::Redraw);
                InteractionState::EdgeSelected { hit, edge_index }
            }
            None => state,
        },

        Event::Click {
            ray,
            mouse,
            now,
            commit_cursor,
        } => {
            let hit = ctx.resolver_mut().resolve(&ray, mouse, now, scene);
            match hit {
                None => {
                    effects.push(Effect::warning("Nothing under the pointer"));
                    state
                }
                Some(hit) if commit_cursor => {
                    let edge = state
                        .hover()
                        .filter(|(h, _)| h.object == hit.object && h.face_index == hit.face_index)
                        .map(|(_, e)| e)
                        .unwrap_or(0);
                    let frame = place_cursor(&hit, edge);
                    ctx.frame = frame;
                    effects.push(Effect::PlaceCursor(frame));
                    effects.push(Effect::Redraw);
                    InteractionState::Committed { frame }
                }
                Some(hit) => {
                    click_mark(ctx, scene, &hit, &mut effects);
                    effects.push(Effect::Redraw);
                    state
                }
            }
        }

        Event::Snap { mode, mouse } => {
            let hover = state.hover().map(|(hit, edge)| (hit.clone(), edge));
            let intersections = hover
                .as_ref()
                .map(|(hit, _)| ctx.limit_intersections(hit))
                .unwrap_or_default();
            let source = match &hover {
                Some((hit, _)) => SnapSource::Face(hit),
                None => SnapSource::Scene(scene),
            };
            match snap_to_nearest_element(
                source,
                mouse,
                mode,
                ctx.settings.snap_threshold,
                viewport,
                &intersections,
            ) {
                Ok(snap) => {
                    if ctx.point_mode {
                        effects.extend(ctx.marking.add_point(snap.location).into_iter().map(Effect::Invalidate));
                    } else {
                        let mut frame = hover
                            .as_ref()
                            .map(|(hit, edge)| place_cursor(hit, *edge))
                            .unwrap_or(ctx.frame);
                        frame.set_position(snap.location);
                        ctx.frame = frame;
                        effects.push(Effect::PlaceCursor(frame));
                    }
                    effects.push(Effect::info(format!("Snapped to {}", snap_kind_name(snap.kind))));
                    effects.push(Effect::Redraw);
                }
                Err(failure) => effects.push(Effect::warning(failure.to_string())),
            }
            state
        }

        Event::TogglePointMode => {
            ctx.point_mode = !ctx.point_mode;
            effects.push(Effect::info(if ctx.point_mode {
                "Point mode on"
            } else {
                "Point mode off"
            }));
            effects.push(Effect::Redraw);
            state
        }

        Event::ToggleCoplanar => {
            ctx.coplanar_mode = !ctx.coplanar_mode;
            effects.push(Effect::info(format!(
                "Coplanar selection {} ({:.0}°)",
                if ctx.coplanar_mode { "on" } else { "off" },
                ctx.settings.coplanar_angle
            )));
            state
        }

        Event::ToggleLimitPlane => {
            let message = match ctx.toggle_limit_plane() {
                Some(_) => "Limitation plane set from cursor",
                None => "Limitation plane cleared",
            };
            effects.push(Effect::info(message));
            effects.push(Effect::Redraw);
            state
        }

        Event::AnglePreset(index) => {
            match angle_preset(index) {
                Some(angle) => {
                    ctx.settings.coplanar_angle = angle;
                    effects.push(Effect::info(format!("Coplanar angle {:.0}°", angle)));
                }
                None => effects.push(Effect::warning(format!("No angle preset {}", index + 1))),
            }
            state
        }

        Event::AdjustAngle { increase, fine } => {
            ctx.settings.coplanar_angle = adjust_angle(ctx.settings.coplanar_angle, increase, fine);
            effects.push(Effect::info(format!("Coplanar angle {:.0}°", ctx.settings.coplanar_angle)));
            state
        }

        Event::AdjustSnapThreshold { increase } => {
            ctx.settings.snap_threshold = adjust_snap_threshold(ctx.settings.snap_threshold, increase);
            effects.push(Effect::info(format!("Snap radius {:.0}px", ctx.settings.snap_threshold)));
            state
        }

        Event::SetPush(push) => {
            ctx.settings.set_push(push);
            push_preview(ctx, scene, &mut effects);
            effects.push(Effect::Redraw);
            state
        }

        Event::SetPreview(kind) => {
            ctx.preview_kind = kind;
            push_preview(ctx, scene, &mut effects);
            effects.push(Effect::Redraw);
            state
        }

        Event::FitCursor => {
            match ctx.fit_cursor_to_marked(scene) {
                Ok(frame) => {
                    effects.push(Effect::PlaceCursor(frame));
                    effects.push(Effect::Redraw);
                }
                Err(e) => effects.push(Effect::warning(e.to_string())),
            }
            state
        }

        Event::Create(kind) => {
            match ctx.final_volume(kind, scene) {
                Ok(volume) => {
                    let name = volume.object_name(&ctx.settings.names).to_string();
                    effects.push(Effect::CreateVolume(volume));
                    effects.push(Effect::info(format!("Created {}", name)));
                }
                Err(e) => {
                    log::warn!("could not create {:?}: {}", kind, e);
                    effects.push(Effect::warning(e.to_string()));
                }
            }
            state
        }

        Event::Clear => {
            effects.extend(ctx.marking.clear_all().into_iter().map(Effect::Invalidate));
            effects.push(Effect::Preview(None));
            effects.push(Effect::Redraw);
            state
        }

        Event::Cancel => {
            effects.push(Effect::Preview(None));
            effects.push(Effect::Exit);
            InteractionState::Idle
        }
    };

    let marked = effects.iter().any(|e| matches!(e, Effect::Invalidate(_)));
    if (marks_changed || marked) && !effects.iter().any(|e| matches!(e, Effect::Preview(_))) {
        push_preview(ctx, scene, &mut effects);
    }

    (next, effects)
}

fn click_mark(ctx: &mut EngineContext, scene: &dyn SceneQuery, hit: &FaceHit, effects: &mut Vec<Effect>) {
    if ctx.point_mode {
        match resolve_point_location(hit, ctx.limit_plane.as_ref()) {
            Ok(location) => effects.extend(ctx.marking.add_point(location).into_iter().map(Effect::Invalidate)),
            Err(message) => effects.push(Effect::warning(message)),
        }
        return;
    }

    let invalidations = if ctx.coplanar_mode {
        let Some(mesh) = scene.object(hit.object) else {
            return;
        };
        let group = grow_coplanar_region(mesh, hit.face_index, ctx.settings.coplanar_angle);
        ctx.marking.mark_group(hit.object, hit.face_index, &group)
    } else if ctx.marking.is_marked(hit.object, hit.face_index) {
        ctx.marking.unmark(hit.object, hit.face_index)
    } else {
        ctx.marking.mark(hit.object, hit.face_index)
    };
    effects.extend(invalidations.into_iter().map(Effect::Invalidate));
}

fn push_preview(ctx: &mut EngineContext, scene: &dyn SceneQuery, effects: &mut Vec<Effect>) {
    let Some(kind) = ctx.preview_kind else {
        return;
    };
    let preview = match ctx.preview_volume(kind, scene) {
        Ok(volume) => Some(volume),
        Err(e) => {
            log::debug!("no {:?} preview: {}", kind, e);
            None
        }
    };
    effects.push(Effect::Preview(preview));
}

fn snap_kind_name(kind: SnapKind) -> &'static str {
    match kind {
        SnapKind::Vertex => "vertex",
        SnapKind::Edge => "edge",
        SnapKind::Face => "face center",
        SnapKind::Intersection => "plane intersection",
    }
}
