//! Contract tests for the denoiser session lifecycle.
//!
//! The denoising model is an opaque vendor component, so these tests pin down
//! the wrapper's observable contract instead of pixel values: which engine
//! configuration a request selects, how many layers reach the invoke call,
//! when validation fires, and that every working allocation is released
//! exactly once.
//!
//! Resource accounting comes from the sys crate's simulation mode and is
//! skipped automatically when the real SDK is linked; the lifecycle
//! assertions run either way.

use std::sync::{Mutex, MutexGuard, OnceLock};

use optix_denoise::error::Error;
use optix_denoise::memory::DeviceBuffer;
use optix_denoise::session::{DenoiseRequest, DenoiserSession};
use optix_denoise::sys;

// the simulation counters are process-global, so tests that diff them must
// not interleave
fn test_lock() -> MutexGuard<'static, ()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(Default::default)
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn frame(width: u32, height: u32, value: f32) -> DeviceBuffer<f32> {
    DeviceBuffer::from_slice(&vec![value; (width * height * 4) as usize]).unwrap()
}

#[test]
fn color_only_session_invokes_one_layer() {
    let _guard = test_lock();
    let color = frame(16, 16, 0.5);
    let output = frame(16, 16, 0.0);

    let mut session = DenoiserSession::init(&DenoiseRequest::new(
        16,
        16,
        color.as_device_ptr(),
        output.as_device_ptr(),
    ))
    .unwrap();
    session.exec().unwrap();

    if let Some(counters) = sys::stub_counters() {
        assert_eq!(counters.last_invoke_layers, 1);
    }
    session.finish().unwrap();
}

#[test]
fn albedo_session_invokes_two_layers() {
    let _guard = test_lock();
    let color = frame(16, 16, 0.5);
    let albedo = frame(16, 16, 0.8);
    let output = frame(16, 16, 0.0);

    let mut request = DenoiseRequest::new(16, 16, color.as_device_ptr(), output.as_device_ptr());
    request.albedo = Some(albedo.as_device_ptr());

    let mut session = DenoiserSession::init(&request).unwrap();
    session.exec().unwrap();

    if let Some(counters) = sys::stub_counters() {
        assert_eq!(counters.last_invoke_layers, 2);
    }
    session.finish().unwrap();
}

#[test]
fn albedo_normal_session_invokes_three_layers() {
    let _guard = test_lock();
    let color = frame(16, 16, 0.5);
    let albedo = frame(16, 16, 0.8);
    let normal = frame(16, 16, 0.0);
    let output = frame(16, 16, 0.0);

    let mut request = DenoiseRequest::new(16, 16, color.as_device_ptr(), output.as_device_ptr());
    request.albedo = Some(albedo.as_device_ptr());
    request.normal = Some(normal.as_device_ptr());

    let mut session = DenoiserSession::init(&request).unwrap();
    session.exec().unwrap();

    if let Some(counters) = sys::stub_counters() {
        assert_eq!(counters.last_invoke_layers, 3);
    }
    session.finish().unwrap();
}

#[test]
fn rejected_requests_touch_no_gpu_state() {
    let _guard = test_lock();
    let color = frame(16, 16, 0.5);
    let normal = frame(16, 16, 0.0);
    let output = frame(16, 16, 0.0);
    let before = sys::stub_counters();

    let mut request = DenoiseRequest::new(16, 16, color.as_device_ptr(), output.as_device_ptr());
    request.normal = Some(normal.as_device_ptr());
    assert_eq!(
        DenoiserSession::init(&request).unwrap_err(),
        Error::NormalWithoutAlbedo
    );

    let mut request = DenoiseRequest::new(16, 16, color.as_device_ptr(), output.as_device_ptr());
    request.color = optix_denoise::memory::DevicePointer::null();
    assert_eq!(
        DenoiserSession::init(&request).unwrap_err(),
        Error::MissingColorBuffer
    );

    let mut request = DenoiseRequest::new(16, 16, color.as_device_ptr(), output.as_device_ptr());
    request.output = optix_denoise::memory::DevicePointer::null();
    assert_eq!(
        DenoiserSession::init(&request).unwrap_err(),
        Error::MissingOutputBuffer
    );

    let request = DenoiseRequest::new(0, 16, color.as_device_ptr(), output.as_device_ptr());
    assert_eq!(
        DenoiserSession::init(&request).unwrap_err(),
        Error::ZeroSizedFrame {
            width: 0,
            height: 16
        }
    );

    let request = DenoiseRequest::new(16, 0, color.as_device_ptr(), output.as_device_ptr());
    assert_eq!(
        DenoiserSession::init(&request).unwrap_err(),
        Error::ZeroSizedFrame {
            width: 16,
            height: 0
        }
    );

    // validation fires before any allocation, context, or engine creation
    if let (Some(before), Some(after)) = (before, sys::stub_counters()) {
        assert_eq!(after.total_allocations, before.total_allocations);
        assert_eq!(after.live_contexts, before.live_contexts);
        assert_eq!(after.live_denoisers, before.live_denoisers);
    }
}

#[test]
fn finish_is_idempotent_and_closes_the_session() {
    let _guard = test_lock();
    let color = frame(16, 16, 0.5);
    let output = frame(16, 16, 0.0);

    let mut session = DenoiserSession::init(&DenoiseRequest::new(
        16,
        16,
        color.as_device_ptr(),
        output.as_device_ptr(),
    ))
    .unwrap();
    assert!(!session.is_finished());

    session.finish().unwrap();
    assert!(session.is_finished());

    // a second finish is a no-op, not a double free
    session.finish().unwrap();

    // and there is no way back to a usable session
    assert_eq!(session.exec().unwrap_err(), Error::SessionFinished);
}

#[test]
fn repeated_exec_runs_independent_synchronous_passes() {
    let _guard = test_lock();
    let color = frame(16, 16, 0.5);
    let output = frame(16, 16, 0.0);

    let mut session = DenoiserSession::init(&DenoiseRequest::new(
        16,
        16,
        color.as_device_ptr(),
        output.as_device_ptr(),
    ))
    .unwrap();

    let before = sys::stub_counters();
    for _ in 0..3 {
        session.exec().unwrap();
    }
    if let (Some(before), Some(after)) = (before, sys::stub_counters()) {
        // each pass estimates intensity, invokes, and waits for the device
        assert_eq!(after.intensity_launches - before.intensity_launches, 3);
        assert_eq!(after.invoke_launches - before.invoke_launches, 3);
        assert_eq!(after.device_syncs - before.device_syncs, 3);
    }
    session.finish().unwrap();
}

#[test]
fn end_to_end_constant_frame() {
    let _guard = test_lock();
    let color = frame(64, 64, 0.5);
    let output = frame(64, 64, 0.0);
    let before = sys::stub_counters();

    let mut session = DenoiserSession::init(&DenoiseRequest::new(
        64,
        64,
        color.as_device_ptr(),
        output.as_device_ptr(),
    ))
    .unwrap();

    // init makes exactly three working allocations: intensity, scratch, state
    if let (Some(before), Some(after_init)) = (before, sys::stub_counters()) {
        assert_eq!(after_init.total_allocations - before.total_allocations, 3);
        assert_eq!(after_init.live_allocations - before.live_allocations, 3);
    }
    assert!(session.gpu_memory().state_size_in_bytes > 0);
    assert!(session.gpu_memory().scratch_size_in_bytes_without_overlap > 0);

    session.exec().unwrap();

    // the pre-zeroed output buffer must have been written
    let denoised = output.as_host_vec().unwrap();
    assert!(denoised.iter().any(|&value| value != 0.0));

    session.finish().unwrap();

    // all three working allocations are released exactly once
    if let (Some(before), Some(after)) = (before, sys::stub_counters()) {
        assert_eq!(after.live_allocations, before.live_allocations);
        assert_eq!(after.live_contexts, before.live_contexts);
        assert_eq!(after.live_denoisers, before.live_denoisers);
    }
    session.finish().unwrap();
}

#[test]
fn dropping_an_unfinished_session_releases_gpu_memory() {
    let _guard = test_lock();
    let color = frame(16, 16, 0.5);
    let output = frame(16, 16, 0.0);
    let before = sys::stub_counters();

    let session = DenoiserSession::init(&DenoiseRequest::new(
        16,
        16,
        color.as_device_ptr(),
        output.as_device_ptr(),
    ))
    .unwrap();
    drop(session);

    if let (Some(before), Some(after)) = (before, sys::stub_counters()) {
        assert_eq!(after.live_allocations, before.live_allocations);
        assert_eq!(after.live_contexts, before.live_contexts);
        assert_eq!(after.live_denoisers, before.live_denoisers);
    }
}
