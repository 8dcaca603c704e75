//! C ABI surface over `sim_core` (spec §6.1): a process-local handle
//! registry of owned `World`s reachable through opaque pointers, packed
//! actions/observations passed as raw byte buffers, and every
//! agent-control/query endpoint named in §6.1 but never given gameplay
//! semantics (see `sim_core::control`).
//!
//! Grounded on the Godot thin client's `CommandBridge`/`ScriptHostBridge`
//! (`clients/godot_thin_client/native/src/lib.rs`): a thin `#[no_mangle]`
//! layer that never lets a panic cross the boundary and that turns
//! fallible calls into a `Dictionary`-style `{ok, error}` result — here a
//! plain `i32` status code plus a retrievable error string, since a C
//! caller has no dictionary type. Every entry point is wrapped in
//! `catch_unwind` for the same reason the client crate never lets a
//! Rust panic unwind into Godot's C++ host.

use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;

use sim_core::{CEnvironmentConfig, EnvironmentConfig, World};

mod render;

static TRACING_INIT: Once = Once::new();

fn init_tracing() {
    TRACING_INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

/// Owns exactly one `World` plus the last error raised against it. The
/// pointer a caller holds to this struct *is* the handle; there is no
/// separate id table to keep in sync (spec §6.1 "opaque handle").
pub struct EnvHandle {
    world: World,
    last_error_code: i32,
    last_error: Option<CString>,
    render_scratch: Option<CString>,
}

impl EnvHandle {
    fn new(config: EnvironmentConfig) -> Self {
        Self {
            world: World::new(config),
            last_error_code: 0,
            last_error: None,
            render_scratch: None,
        }
    }

    fn set_error(&mut self, code: i32, message: impl Into<String>) {
        let message = message.into();
        tracing::error!(code, %message, "sim_ffi invariant violation");
        self.last_error_code = code;
        self.last_error = CString::new(message).ok();
    }

    fn clear_error(&mut self) {
        self.last_error_code = 0;
        self.last_error = None;
    }
}

const ERR_NULL_HANDLE: i32 = -1;
const ERR_BAD_ARGUMENT: i32 = -2;
const ERR_PANIC: i32 = -3;

/// Runs `body` with the handle behind `ptr`, catching panics so they never
/// unwind across the ABI boundary (spec §7 "FFI layer: every extern "C"
/// function wraps its body in `catch_unwind`").
unsafe fn with_handle<R>(ptr: *mut EnvHandle, default: R, body: impl FnOnce(&mut EnvHandle) -> R) -> R {
    let Some(handle) = ptr.as_mut() else {
        return default;
    };
    match panic::catch_unwind(AssertUnwindSafe(|| body(handle))) {
        Ok(value) => value,
        Err(_) => {
            handle.set_error(ERR_PANIC, "panic caught at FFI boundary");
            default
        }
    }
}

#[no_mangle]
pub extern "C" fn sim_create() -> *mut EnvHandle {
    init_tracing();
    let handle = match panic::catch_unwind(|| EnvHandle::new(EnvironmentConfig::default())) {
        Ok(handle) => handle,
        Err(_) => return std::ptr::null_mut(),
    };
    Box::into_raw(Box::new(handle))
}

/// # Safety
/// `ptr` must be a handle returned by [`sim_create`] and not yet destroyed.
#[no_mangle]
pub unsafe extern "C" fn sim_destroy(ptr: *mut EnvHandle) {
    if ptr.is_null() {
        return;
    }
    let _ = panic::catch_unwind(AssertUnwindSafe(|| {
        drop(Box::from_raw(ptr));
    }));
}

/// # Safety
/// `config` must point to a valid, initialized `CEnvironmentConfig`.
#[no_mangle]
pub unsafe extern "C" fn sim_set_config(ptr: *mut EnvHandle, config: *const CEnvironmentConfig) -> i32 {
    with_handle(ptr, ERR_NULL_HANDLE, |handle| {
        let Some(config) = config.as_ref() else {
            handle.set_error(ERR_BAD_ARGUMENT, "null config pointer");
            return ERR_BAD_ARGUMENT;
        };
        handle.world.config.apply_c_config(config);
        handle.clear_error();
        0
    })
}

/// Resets the episode and writes the fresh observation tensor into
/// `obs_out` (spec §6.1 "reset_and_get_obs"). `obs_len` must be at least
/// `num_agents * obs_layers * obs_width * obs_height`.
///
/// # Safety
/// `obs_out` must point to at least `obs_len` writable bytes.
#[no_mangle]
pub unsafe extern "C" fn sim_reset_and_get_obs(ptr: *mut EnvHandle, obs_out: *mut u8, obs_len: usize) -> i32 {
    with_handle(ptr, ERR_NULL_HANDLE, |handle| {
        handle.world.reset();
        copy_observations(handle, obs_out, obs_len)
    })
}

/// Steps the simulation with one packed action byte per agent (spec
/// §6.2) and writes back observations, rewards, terminated, and
/// truncated buffers.
///
/// # Safety
/// `actions_ptr` must point to `actions_len` readable bytes; `obs_out`
/// must point to at least `obs_len` writable bytes; `rewards_out`,
/// `terminated_out`, and `truncated_out` must each point to at least
/// `num_agents` writable elements.
#[no_mangle]
#[allow(clippy::too_many_arguments)]
pub unsafe extern "C" fn sim_step(
    ptr: *mut EnvHandle,
    actions_ptr: *const u8,
    actions_len: usize,
    obs_out: *mut u8,
    obs_len: usize,
    rewards_out: *mut f32,
    terminated_out: *mut u8,
    truncated_out: *mut u8,
) -> i32 {
    with_handle(ptr, ERR_NULL_HANDLE, |handle| {
        if actions_ptr.is_null() && actions_len > 0 {
            handle.set_error(ERR_BAD_ARGUMENT, "null actions pointer");
            return ERR_BAD_ARGUMENT;
        }
        let actions = if actions_len == 0 {
            &[][..]
        } else {
            std::slice::from_raw_parts(actions_ptr, actions_len)
        };
        handle.world.step(actions);

        let status = copy_observations(handle, obs_out, obs_len);
        if status != 0 {
            return status;
        }
        let num_agents = handle.world.config.num_agents;
        if !rewards_out.is_null() {
            let dest = std::slice::from_raw_parts_mut(rewards_out, num_agents);
            dest.copy_from_slice(&handle.world.rewards);
        }
        if !terminated_out.is_null() {
            let dest = std::slice::from_raw_parts_mut(terminated_out, num_agents);
            dest.copy_from_slice(&handle.world.terminated);
        }
        if !truncated_out.is_null() {
            let dest = std::slice::from_raw_parts_mut(truncated_out, num_agents);
            dest.copy_from_slice(&handle.world.truncated);
        }
        handle.clear_error();
        0
    })
}

unsafe fn copy_observations(handle: &mut EnvHandle, obs_out: *mut u8, obs_len: usize) -> i32 {
    let needed = handle.world.observations.len();
    if obs_out.is_null() || obs_len < needed {
        handle.set_error(ERR_BAD_ARGUMENT, format!("obs buffer too small: need {needed}, got {obs_len}"));
        return ERR_BAD_ARGUMENT;
    }
    let dest = std::slice::from_raw_parts_mut(obs_out, needed);
    dest.copy_from_slice(&handle.world.observations);
    0
}

macro_rules! introspect {
    ($name:ident, $field:expr, $ty:ty) => {
        /// # Safety
        /// `ptr` must be a live handle returned by [`sim_create`].
        #[no_mangle]
        pub unsafe extern "C" fn $name(ptr: *mut EnvHandle) -> $ty {
            with_handle(ptr, -1 as $ty, |handle| $field(handle))
        }
    };
}

introspect!(sim_get_num_agents, |h: &EnvHandle| h.world.config.num_agents as i32, i32);
introspect!(sim_get_obs_layers, |_h: &EnvHandle| sim_core::OBSERVATION_LAYERS as i32, i32);
introspect!(sim_get_obs_width, |_h: &EnvHandle| sim_core::OBS_WIDTH, i32);
introspect!(sim_get_obs_height, |_h: &EnvHandle| sim_core::OBS_HEIGHT, i32);
introspect!(sim_get_map_width, |h: &EnvHandle| h.world.width(), i32);
introspect!(sim_get_map_height, |h: &EnvHandle| h.world.height(), i32);
introspect!(sim_get_num_teams, |h: &EnvHandle| h.world.num_teams() as i32, i32);
introspect!(sim_get_num_unit_classes, |_h: &EnvHandle| 5, i32);
introspect!(sim_get_current_step, |h: &EnvHandle| h.world.current_step as i64, i64);

/// Writes a `width*height*3` RGB buffer (spec §6.1 "render_rgb"), one
/// color triple per tile, terrain base color overlaid by the occupying
/// entity's team/kind color.
///
/// # Safety
/// `buf_out` must point to at least `buf_len` writable bytes.
#[no_mangle]
pub unsafe extern "C" fn sim_render_rgb(ptr: *mut EnvHandle, buf_out: *mut u8, buf_len: usize) -> i32 {
    with_handle(ptr, ERR_NULL_HANDLE, |handle| {
        let pixels = render::render_rgb(&handle.world);
        if buf_out.is_null() || buf_len < pixels.len() {
            handle.set_error(ERR_BAD_ARGUMENT, format!("rgb buffer too small: need {}, got {buf_len}", pixels.len()));
            return ERR_BAD_ARGUMENT;
        }
        std::slice::from_raw_parts_mut(buf_out, pixels.len()).copy_from_slice(&pixels);
        handle.clear_error();
        0
    })
}

/// Returns a NUL-terminated ANSI-colored text render of the map, owned by
/// the handle until the next render call or `sim_destroy` (spec §6.1
/// "render_ansi"). Never freed independently by the caller.
#[no_mangle]
pub extern "C" fn sim_render_ansi(ptr: *mut EnvHandle) -> *const c_char {
    unsafe {
        with_handle(ptr, std::ptr::null(), |handle| {
            let text = render::render_ansi(&handle.world);
            let cstring = CString::new(text).unwrap_or_default();
            let raw = cstring.as_ptr();
            handle.render_scratch = Some(cstring);
            raw
        })
    }
}

#[no_mangle]
pub extern "C" fn sim_has_error(ptr: *mut EnvHandle) -> i32 {
    unsafe { with_handle(ptr, 0, |handle| handle.last_error.is_some() as i32) }
}

#[no_mangle]
pub extern "C" fn sim_get_error_code(ptr: *mut EnvHandle) -> i32 {
    unsafe { with_handle(ptr, 0, |handle| handle.last_error_code) }
}

#[no_mangle]
pub extern "C" fn sim_get_error_message(ptr: *mut EnvHandle) -> *const c_char {
    unsafe {
        with_handle(ptr, std::ptr::null(), |handle| {
            handle.last_error.as_ref().map(|c| c.as_ptr()).unwrap_or(std::ptr::null())
        })
    }
}

#[no_mangle]
pub extern "C" fn sim_clear_error(ptr: *mut EnvHandle) {
    unsafe {
        with_handle(ptr, (), |handle| handle.clear_error());
    }
}

// --- Agent-control / query endpoints (spec §6.1; see sim_core::control) ---

macro_rules! agent_set_i32 {
    ($name:ident, $method:ident) => {
        #[no_mangle]
        pub extern "C" fn $name(ptr: *mut EnvHandle, agent_id: i32, value: i32) -> i32 {
            unsafe { with_handle(ptr, ERR_NULL_HANDLE, |h| h.world.control.$method(agent_id, value)) }
        }
    };
}

macro_rules! agent_get_i32 {
    ($name:ident, $method:ident) => {
        #[no_mangle]
        pub extern "C" fn $name(ptr: *mut EnvHandle, agent_id: i32) -> i32 {
            unsafe { with_handle(ptr, -1, |h| h.world.control.$method(agent_id)) }
        }
    };
}

macro_rules! agent_set_bool {
    ($name:ident, $method:ident) => {
        #[no_mangle]
        pub extern "C" fn $name(ptr: *mut EnvHandle, agent_id: i32, value: i32) -> i32 {
            unsafe { with_handle(ptr, ERR_NULL_HANDLE, |h| h.world.control.$method(agent_id, value != 0)) }
        }
    };
}

#[no_mangle]
pub extern "C" fn sim_set_attack_move(ptr: *mut EnvHandle, agent_id: i32, x: i32, y: i32) -> i32 {
    unsafe { with_handle(ptr, ERR_NULL_HANDLE, |h| h.world.control.set_attack_move(agent_id, x, y)) }
}

#[no_mangle]
pub extern "C" fn sim_clear_attack_move(ptr: *mut EnvHandle, agent_id: i32) -> i32 {
    unsafe { with_handle(ptr, ERR_NULL_HANDLE, |h| h.world.control.clear_attack_move(agent_id)) }
}

/// Writes `(x, y)` into `out_x`/`out_y`; returns `0` if no target is set
/// or the agent id is invalid, `1` on success.
///
/// # Safety
/// `out_x` and `out_y` must each point to one writable `i32`.
#[no_mangle]
pub unsafe extern "C" fn sim_get_attack_move(ptr: *mut EnvHandle, agent_id: i32, out_x: *mut i32, out_y: *mut i32) -> i32 {
    with_handle(ptr, 0, |h| match h.world.control.get_attack_move(agent_id) {
        Some((x, y)) => {
            if !out_x.is_null() {
                *out_x = x;
            }
            if !out_y.is_null() {
                *out_y = y;
            }
            1
        }
        None => 0,
    })
}

#[no_mangle]
pub extern "C" fn sim_set_patrol(ptr: *mut EnvHandle, agent_id: i32, x1: i32, y1: i32, x2: i32, y2: i32) -> i32 {
    unsafe { with_handle(ptr, ERR_NULL_HANDLE, |h| h.world.control.set_patrol(agent_id, x1, y1, x2, y2)) }
}

/// # Safety
/// `out_x1`, `out_y1`, `out_x2`, `out_y2` must each point to one writable `i32`.
#[no_mangle]
pub unsafe extern "C" fn sim_get_patrol(
    ptr: *mut EnvHandle,
    agent_id: i32,
    out_x1: *mut i32,
    out_y1: *mut i32,
    out_x2: *mut i32,
    out_y2: *mut i32,
) -> i32 {
    with_handle(ptr, 0, |h| match h.world.control.get_patrol(agent_id) {
        Some(((x1, y1), (x2, y2))) => {
            for (ptr, value) in [(out_x1, x1), (out_y1, y1), (out_x2, x2), (out_y2, y2)] {
                if !ptr.is_null() {
                    *ptr = value;
                }
            }
            1
        }
        None => 0,
    })
}

agent_set_i32!(sim_set_stance, set_stance);
agent_get_i32!(sim_get_stance, get_stance);
agent_set_i32!(sim_set_garrison, set_garrison);
agent_get_i32!(sim_get_garrison, get_garrison);
agent_set_i32!(sim_set_production_queue, set_production_queue);
agent_get_i32!(sim_get_production_queue, get_production_queue);
agent_set_i32!(sim_set_research, set_research);
agent_get_i32!(sim_get_research, get_research);
agent_set_bool!(sim_set_scout_mode, set_scout_mode);
agent_get_i32!(sim_get_scout_mode, get_scout_mode);
agent_set_bool!(sim_set_fog_reveal, set_fog_reveal);
agent_get_i32!(sim_get_fog_reveal, get_fog_reveal);
agent_set_i32!(sim_set_follow_target, set_follow_target);
agent_get_i32!(sim_get_follow_target, get_follow_target);
agent_set_i32!(sim_set_formation, set_formation);
agent_get_i32!(sim_get_formation, get_formation);
agent_set_i32!(sim_set_control_group, set_control_group);
agent_get_i32!(sim_get_control_group, get_control_group);
agent_set_bool!(sim_set_selected, set_selected);
agent_get_i32!(sim_get_selected, get_selected);
agent_set_bool!(sim_set_hold_position, set_hold_position);
agent_get_i32!(sim_get_hold_position, get_hold_position);

#[no_mangle]
pub extern "C" fn sim_set_rally_point(ptr: *mut EnvHandle, agent_id: i32, x: i32, y: i32) -> i32 {
    unsafe { with_handle(ptr, ERR_NULL_HANDLE, |h| h.world.control.set_rally_point(agent_id, x, y)) }
}

/// # Safety
/// `out_x` and `out_y` must each point to one writable `i32`.
#[no_mangle]
pub unsafe extern "C" fn sim_get_rally_point(ptr: *mut EnvHandle, agent_id: i32, out_x: *mut i32, out_y: *mut i32) -> i32 {
    with_handle(ptr, 0, |h| match h.world.control.get_rally_point(agent_id) {
        Some((x, y)) => {
            if !out_x.is_null() {
                *out_x = x;
            }
            if !out_y.is_null() {
                *out_y = y;
            }
            1
        }
        None => 0,
    })
}

#[no_mangle]
pub extern "C" fn sim_stop(ptr: *mut EnvHandle, agent_id: i32) -> i32 {
    unsafe { with_handle(ptr, ERR_NULL_HANDLE, |h| h.world.control.stop(agent_id)) }
}

// --- Team-level knobs and queries ---

#[no_mangle]
pub extern "C" fn sim_set_gather_rate(ptr: *mut EnvHandle, team_id: i32, value: f32) -> i32 {
    unsafe { with_handle(ptr, ERR_NULL_HANDLE, |h| h.world.control.set_gather_rate(team_id, value)) }
}

#[no_mangle]
pub extern "C" fn sim_get_gather_rate(ptr: *mut EnvHandle, team_id: i32) -> f32 {
    unsafe { with_handle(ptr, -1.0, |h| h.world.control.get_gather_rate(team_id)) }
}

#[no_mangle]
pub extern "C" fn sim_set_build_cost_multiplier(ptr: *mut EnvHandle, team_id: i32, value: f32) -> i32 {
    unsafe { with_handle(ptr, ERR_NULL_HANDLE, |h| h.world.control.set_build_cost_multiplier(team_id, value)) }
}

#[no_mangle]
pub extern "C" fn sim_set_class_bonus(ptr: *mut EnvHandle, team_id: i32, hp_bonus: i32, attack_bonus: i32) -> i32 {
    unsafe { with_handle(ptr, ERR_NULL_HANDLE, |h| h.world.control.set_class_bonus(team_id, hp_bonus, attack_bonus)) }
}

agent_set_i32!(sim_set_territory_score, set_territory_score);
agent_get_i32!(sim_get_territory_score, get_territory_score);
agent_set_i32!(sim_set_ai_difficulty, set_ai_difficulty);
agent_get_i32!(sim_get_ai_difficulty, get_ai_difficulty);

/// Team stockpile accessor; `resource` is `0=food, 1=wood, 2=stone,
/// 3=gold, 4=water` (spec §4.6 "Stockpile"). Returns `-1` for an invalid
/// team or resource index.
#[no_mangle]
pub extern "C" fn sim_get_stockpile(ptr: *mut EnvHandle, team_id: i32, resource: i32) -> i32 {
    unsafe {
        with_handle(ptr, -1, |h| {
            let Some(s) = usize::try_from(team_id).ok().and_then(|i| h.world.stockpiles.get(i)) else {
                return -1;
            };
            match resource {
                0 => s.food,
                1 => s.wood,
                2 => s.stone,
                3 => s.gold,
                4 => s.water,
                _ => -1,
            }
        })
    }
}

#[no_mangle]
pub extern "C" fn sim_set_stockpile(ptr: *mut EnvHandle, team_id: i32, resource: i32, value: i32) -> i32 {
    unsafe {
        with_handle(ptr, ERR_NULL_HANDLE, |h| {
            let Some(s) = usize::try_from(team_id).ok().and_then(|i| h.world.stockpiles.get_mut(i)) else {
                return -1;
            };
            match resource {
                0 => s.food = value,
                1 => s.wood = value,
                2 => s.stone = value,
                3 => s.gold = value,
                4 => s.water = value,
                _ => return -1,
            }
            1
        })
    }
}

/// Threat-map query: the id of the nearest predator-relevant target to
/// `(x, y)` within `max_dist` tiles (spec §4.7's Tumor/military/villager
/// priority order via `SpatialIndex::find_nearest_predator_target`), or
/// `-1` if none is in range.
#[no_mangle]
pub extern "C" fn sim_query_nearest_threat(ptr: *mut EnvHandle, x: i32, y: i32, max_dist: i32) -> i32 {
    unsafe {
        with_handle(ptr, -1, |h| {
            let pos = sim_core::Pos::new(x, y);
            h.world
                .spatial
                .find_nearest_predator_target(&h.world.registry, pos, max_dist)
                .map(|id| id.0 as i32)
                .unwrap_or(-1)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_step_destroy_round_trip() {
        let ptr = sim_create();
        assert!(!ptr.is_null());
        let num_agents = sim_get_num_agents(ptr);
        assert!(num_agents > 0);

        let obs_len = unsafe { (*ptr).world.observations.len() };
        let mut obs = vec![0u8; obs_len];
        let status = unsafe { sim_reset_and_get_obs(ptr, obs.as_mut_ptr(), obs.len()) };
        assert_eq!(status, 0);

        let actions = vec![0u8; num_agents as usize];
        let mut rewards = vec![0.0f32; num_agents as usize];
        let mut terminated = vec![0u8; num_agents as usize];
        let mut truncated = vec![0u8; num_agents as usize];
        let status = unsafe {
            sim_step(
                ptr,
                actions.as_ptr(),
                actions.len(),
                obs.as_mut_ptr(),
                obs.len(),
                rewards.as_mut_ptr(),
                terminated.as_mut_ptr(),
                truncated.as_mut_ptr(),
            )
        };
        assert_eq!(status, 0);
        unsafe { sim_destroy(ptr) };
    }

    #[test]
    fn undersized_obs_buffer_reports_error() {
        let ptr = sim_create();
        let mut tiny = vec![0u8; 1];
        let status = unsafe { sim_reset_and_get_obs(ptr, tiny.as_mut_ptr(), tiny.len()) };
        assert_eq!(status, ERR_BAD_ARGUMENT);
        assert_eq!(sim_has_error(ptr), 1);
        unsafe { sim_destroy(ptr) };
    }

    #[test]
    fn agent_control_round_trips() {
        let ptr = sim_create();
        assert_eq!(sim_set_attack_move(ptr, 0, 4, 9), 1);
        let (mut x, mut y) = (0, 0);
        assert_eq!(unsafe { sim_get_attack_move(ptr, 0, &mut x, &mut y) }, 1);
        assert_eq!((x, y), (4, 9));
        assert_eq!(sim_set_attack_move(ptr, 9999, 0, 0), -1);
        unsafe { sim_destroy(ptr) };
    }
}
