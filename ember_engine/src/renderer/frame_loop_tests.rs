//! Unit tests for the frame loop
//!
//! Every test drives FrameLoop against MockDevice, which rejects protocol
//! mistakes (resetting an unsignaled fence, waiting on a semaphore nothing
//! signalled, destroying objects still in use).

use std::sync::Arc;
use crate::config::RendererConfig;
use crate::device::mock_device::{MockDevice, MockRecorder, MockWindow, ObjectKind};
use crate::device::{Extent2D, PipelineStageFlags};
use crate::error::{Error, StaleReason};
use crate::renderer::frame_loop::FrameLoop;

type MockLoop = FrameLoop<MockDevice, MockRecorder, MockWindow>;

fn make_loop(device: &Arc<MockDevice>, window: MockWindow, frames_in_flight: usize) -> MockLoop {
    let recorder = MockRecorder::new(device.clone());
    let config = RendererConfig::default().with_frames_in_flight(frames_in_flight);
    FrameLoop::new(device.clone(), recorder, window, config).unwrap()
}

fn setup(frames_in_flight: usize) -> (Arc<MockDevice>, MockLoop) {
    let device = MockDevice::new();
    let frame_loop = make_loop(&device, MockWindow::new(800, 600), frames_in_flight);
    (device, frame_loop)
}

fn position(events: &[String], prefix: &str) -> usize {
    events
        .iter()
        .position(|e| e.starts_with(prefix))
        .unwrap_or_else(|| panic!("no event starting with {:?} in {:?}", prefix, events))
}

fn last_position(events: &[String], prefix: &str) -> usize {
    events
        .iter()
        .rposition(|e| e.starts_with(prefix))
        .unwrap_or_else(|| panic!("no event starting with {:?} in {:?}", prefix, events))
}

fn assert_aligned(frame_loop: &MockLoop) {
    let swapchain = frame_loop.swapchain().expect("swapchain");
    let frames = frame_loop.frame_resources().expect("frame resources");
    assert_eq!(swapchain.images().len(), swapchain.image_views().len());
    assert_eq!(swapchain.images().len(), frames.len());
}

// ============================================================================
// CONSTRUCTION
// ============================================================================

#[test]
fn test_new_creates_ring_chain_and_frames() {
    let (device, frame_loop) = setup(2);

    assert_eq!(frame_loop.frames_in_flight(), 2);
    assert_eq!(frame_loop.current_frame(), 0);
    assert_eq!(frame_loop.swapchain().unwrap().extent(), Extent2D::new(800, 600));
    assert_eq!(frame_loop.frame_resources().unwrap().len(), 3);
    assert_aligned(&frame_loop);
    assert_eq!(device.live_count(ObjectKind::Fence), 2);
    assert_eq!(frame_loop.recorder().prepare_calls, 1);
}

#[test]
fn test_new_rejects_invalid_config() {
    let device = MockDevice::new();
    let recorder = MockRecorder::new(device.clone());
    let config = RendererConfig::default().with_frames_in_flight(0);

    let result = FrameLoop::new(device.clone(), recorder, MockWindow::new(800, 600), config);

    assert!(matches!(result, Err(Error::InvalidResource(_))));
    assert_eq!(device.total_live(), 0);
}

#[test]
fn test_new_waits_while_minimized() {
    let device = MockDevice::new();
    let window = MockWindow::new(0, 0).then_sizes(&[(0, 0), (640, 480)]);

    let frame_loop = make_loop(&device, window, 2);

    assert_eq!(frame_loop.window().wait_calls, 2);
    assert_eq!(frame_loop.swapchain().unwrap().extent(), Extent2D::new(640, 480));
    assert!(device.swapchain_configs().iter().all(|c| !c.extent.is_empty()));
}

#[test]
fn test_new_record_failure_is_fatal_and_leaks_nothing() {
    let device = MockDevice::new();
    let recorder = MockRecorder::new(device.clone()).failing_at(1);

    let result = FrameLoop::new(device.clone(), recorder, MockWindow::new(800, 600), RendererConfig::default());

    assert!(matches!(result, Err(Error::ResourceCreationFailed(_))));
    assert_eq!(device.total_live(), 0);
    assert!(device.violations().is_empty());
}

// ============================================================================
// STEADY STATE
// ============================================================================

#[test]
fn test_f_plus_one_frames_without_recreation() {
    let (device, mut frame_loop) = setup(2);

    for _ in 0..3 {
        frame_loop.draw_frame().unwrap();
    }

    let stats = frame_loop.stats();
    assert_eq!(stats.frames_presented, 3);
    assert_eq!(stats.recreations, 0);
    assert_eq!(stats.frames_skipped, 0);
    assert_eq!(device.created_count(ObjectKind::Swapchain), 1);
    assert!(device.violations().is_empty());
}

#[test]
fn test_current_frame_is_n_mod_f() {
    for frames_in_flight in 1..=4 {
        let (_device, mut frame_loop) = setup(frames_in_flight);
        for n in 1..=10 {
            frame_loop.draw_frame().unwrap();
            assert_eq!(frame_loop.current_frame(), n % frames_in_flight);
            assert!(frame_loop.current_frame() < frames_in_flight);
        }
    }
}

#[test]
fn test_frame_steps_are_ordered() {
    let (device, mut frame_loop) = setup(2);
    frame_loop.draw_frame().unwrap();
    frame_loop.draw_frame().unwrap();
    device.clear_events();

    // third frame reuses slot 0, whose submission is still pending
    frame_loop.draw_frame().unwrap();

    let events = device.events();
    let wait = position(&events, "wait_fence");
    let acquire = position(&events, "acquire");
    let reset = position(&events, "reset_fence");
    let submit = position(&events, "submit");
    let present = position(&events, "present");
    assert!(wait < acquire);
    assert!(acquire < reset);
    assert!(reset < submit);
    assert!(submit < present);
    assert!(device.violations().is_empty());
}

#[test]
fn test_submission_waits_at_color_output_and_uses_slot_objects() {
    let (device, mut frame_loop) = setup(2);
    for _ in 0..4 {
        frame_loop.draw_frame().unwrap();
    }

    let submissions = device.submissions();
    assert_eq!(submissions.len(), 4);
    for s in &submissions {
        assert_eq!(s.wait_stage, PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT);
        assert_ne!(s.wait_semaphore, s.signal_semaphore);
    }
    // slots alternate with period F, independent of the image used
    assert_eq!(submissions[0].fence, submissions[2].fence);
    assert_eq!(submissions[1].fence, submissions[3].fence);
    assert_ne!(submissions[0].fence, submissions[1].fence);
    assert_eq!(submissions[0].wait_semaphore, submissions[2].wait_semaphore);
    // 3 images, 2 slots: image 0 comes back on the fourth frame
    assert_eq!(submissions[0].command_buffer, submissions[3].command_buffer);
}

#[test]
fn test_same_image_from_another_slot_waits_for_its_previous_submission() {
    let (device, mut frame_loop) = setup(2);
    device.script_acquire(Ok(0));
    device.script_acquire(Ok(0));

    frame_loop.draw_frame().unwrap();
    let first_fence = device.submissions()[0].fence;
    device.clear_events();
    frame_loop.draw_frame().unwrap();

    let events = device.events();
    let acquire = position(&events, "acquire 0");
    let waited = events
        .iter()
        .position(|e| *e == format!("wait_fence {}", first_fence))
        .expect("previous slot's fence waited");
    assert!(acquire < waited);
    assert!(waited < position(&events, "submit"));
    assert!(device.violations().is_empty());
}

#[test]
fn test_more_images_than_slots() {
    let device = MockDevice::with_image_count(4);
    let mut frame_loop = make_loop(&device, MockWindow::new(800, 600), 2);

    for _ in 0..9 {
        frame_loop.draw_frame().unwrap();
    }

    assert_eq!(frame_loop.frame_resources().unwrap().len(), 4);
    assert_eq!(frame_loop.frames_in_flight(), 2);
    assert_eq!(frame_loop.current_frame(), 1);
    assert!(device.violations().is_empty());
}

// ============================================================================
// STALE-RECREATE
// ============================================================================

#[test]
fn test_out_of_date_on_third_frame_recreates_once() {
    let (device, mut frame_loop) = setup(2);
    frame_loop.draw_frame().unwrap();
    frame_loop.draw_frame().unwrap();
    device.script_acquire(Err(Error::SwapchainStale(StaleReason::OutOfDate)));

    let before = frame_loop.current_frame();
    frame_loop.draw_frame().unwrap();

    assert_eq!(frame_loop.current_frame(), before);
    assert_eq!(frame_loop.stats().recreations, 1);
    assert_eq!(frame_loop.stats().frames_skipped, 1);
    assert_eq!(frame_loop.stats().frames_presented, 2);
    assert_eq!(device.created_count(ObjectKind::Swapchain), 2);
    assert_aligned(&frame_loop);

    frame_loop.draw_frame().unwrap();

    assert_eq!(frame_loop.stats().frames_presented, 3);
    assert_eq!(frame_loop.stats().recreations, 1);
    assert_eq!(frame_loop.current_frame(), (before + 1) % 2);
    assert!(device.violations().is_empty());
}

#[test]
fn test_suboptimal_acquire_recreates() {
    let (device, mut frame_loop) = setup(2);
    device.script_acquire(Err(Error::SwapchainStale(StaleReason::Suboptimal)));

    frame_loop.draw_frame().unwrap();

    assert_eq!(frame_loop.stats().recreations, 1);
    assert_eq!(frame_loop.current_frame(), 0);
    assert!(device.submissions().is_empty());
}

#[test]
fn test_resize_flag_skips_acquire_and_recreates() {
    let (device, mut frame_loop) = setup(2);
    frame_loop.draw_frame().unwrap();
    let flag = frame_loop.resize_flag();
    frame_loop.window_mut().size = Extent2D::new(1024, 768);
    device.clear_events();

    flag.mark();
    frame_loop.draw_frame().unwrap();

    let events = device.events();
    assert!(!events.iter().any(|e| e.starts_with("acquire")));
    assert!(!flag.is_set());
    assert_eq!(frame_loop.swapchain().unwrap().extent(), Extent2D::new(1024, 768));
    assert_eq!(frame_loop.current_frame(), 1);
    assert!(device.violations().is_empty());
}

#[test]
fn test_notify_resized_sets_shared_flag() {
    let (_device, frame_loop) = setup(2);
    let flag = frame_loop.resize_flag();
    assert!(!flag.is_set());
    frame_loop.notify_resized();
    assert!(flag.is_set());
}

#[test]
fn test_recreate_drains_then_releases_in_order() {
    let (device, mut frame_loop) = setup(2);
    frame_loop.draw_frame().unwrap();
    frame_loop.draw_frame().unwrap();
    device.clear_events();

    frame_loop.recreate_swapchain().unwrap();

    let events = device.events();
    let idle = position(&events, "wait_idle");
    let first_cb = position(&events, "free_command_buffer");
    let last_fb = last_position(&events, "destroy_framebuffer");
    let recorder_release = position(&events, "recorder_release");
    let first_view = position(&events, "destroy_image_view");
    let last_view = last_position(&events, "destroy_image_view");
    let chain = position(&events, "destroy_swapchain");
    let create = position(&events, "create_swapchain");
    let prepare = position(&events, "recorder_prepare");

    assert!(idle < first_cb);
    assert!(last_fb < recorder_release);
    assert!(recorder_release < first_view);
    assert!(last_view < chain);
    assert!(chain < create);
    assert!(create < prepare);
    assert!(device.violations().is_empty());
}

#[test]
fn test_recreate_keeps_sync_ring() {
    let (device, mut frame_loop) = setup(3);
    frame_loop.draw_frame().unwrap();

    for _ in 0..3 {
        frame_loop.recreate_swapchain().unwrap();
    }

    assert_eq!(device.created_count(ObjectKind::Fence), 3);
    assert_eq!(device.created_count(ObjectKind::Semaphore), 6);
    assert_eq!(frame_loop.frames_in_flight(), 3);
    assert_eq!(frame_loop.current_frame(), 1);
    assert_eq!(device.live_count(ObjectKind::Swapchain), 1);
}

#[test]
fn test_minimized_window_blocks_until_drawable() {
    let (device, mut frame_loop) = setup(2);
    frame_loop.draw_frame().unwrap();
    {
        let window = frame_loop.window_mut();
        window.size = Extent2D::new(0, 0);
        window.pending_sizes.extend([Extent2D::new(0, 0), Extent2D::new(0, 0), Extent2D::new(1024, 768)]);
    }

    frame_loop.notify_resized();
    frame_loop.draw_frame().unwrap();

    assert_eq!(frame_loop.window().wait_calls, 3);
    assert!(device.swapchain_configs().iter().all(|c| !c.extent.is_empty()));
    assert_eq!(frame_loop.swapchain().unwrap().extent(), Extent2D::new(1024, 768));
    assert_eq!(frame_loop.stats().recreations, 1);
    assert!(device.violations().is_empty());
}

#[test]
fn test_close_while_minimized_abandons_recreation() {
    let (device, mut frame_loop) = setup(2);
    {
        let window = frame_loop.window_mut();
        window.size = Extent2D::new(0, 0);
        window.close_after_waits = Some(2);
    }
    let flag = frame_loop.resize_flag();

    flag.mark();
    frame_loop.draw_frame().unwrap();

    assert!(frame_loop.swapchain().is_some());
    assert_eq!(frame_loop.stats().recreations, 0);
    assert_eq!(device.created_count(ObjectKind::Swapchain), 1);
    assert!(flag.is_set());
}

#[test]
fn test_zero_surface_extent_defers_chain_creation() {
    let (device, mut frame_loop) = setup(2);
    frame_loop.draw_frame().unwrap();
    device.set_current_extent(Some(Extent2D::new(0, 0)));

    frame_loop.notify_resized();
    frame_loop.draw_frame().unwrap();

    assert!(frame_loop.swapchain().is_none());
    assert!(frame_loop.frame_resources().is_none());
    assert_eq!(device.live_count(ObjectKind::Swapchain), 0);

    // still zero: skipped again, nothing created
    frame_loop.draw_frame().unwrap();
    assert!(frame_loop.swapchain().is_none());

    device.set_current_extent(None);
    frame_loop.draw_frame().unwrap();
    assert!(frame_loop.swapchain().is_some());
    frame_loop.draw_frame().unwrap();

    assert_eq!(frame_loop.stats().frames_presented, 2);
    assert_eq!(frame_loop.stats().frames_skipped, 3);
    assert!(device.violations().is_empty());
}

// ============================================================================
// ERROR HANDLING
// ============================================================================

#[test]
fn test_fatal_acquire_error_propagates() {
    let (device, mut frame_loop) = setup(2);
    device.script_acquire(Err(Error::DeviceLost("hung".to_string())));

    let result = frame_loop.draw_frame();

    assert_eq!(result, Err(Error::DeviceLost("hung".to_string())));
    assert!(result.unwrap_err().is_fatal());
    assert_eq!(frame_loop.stats().recreations, 0);
}

#[test]
fn test_submission_failure_is_fatal() {
    let (device, mut frame_loop) = setup(2);
    device.fail_next_submit(Error::SubmissionFailed("queue rejected".to_string()));

    assert!(matches!(frame_loop.draw_frame(), Err(Error::SubmissionFailed(_))));
    assert_eq!(frame_loop.current_frame(), 0);
}

#[test]
fn test_present_failure_is_not_fatal_and_schedules_rebuild() {
    let (device, mut frame_loop) = setup(2);
    device.script_present(Err(Error::BackendError("VK_ERROR_SURFACE_LOST_KHR".to_string())));

    frame_loop.draw_frame().unwrap();

    assert_eq!(frame_loop.stats().present_failures, 1);
    assert_eq!(frame_loop.stats().frames_presented, 0);
    assert_eq!(frame_loop.current_frame(), 1);
    assert!(frame_loop.resize_flag().is_set());

    frame_loop.draw_frame().unwrap();
    assert_eq!(frame_loop.stats().recreations, 1);
    assert!(device.violations().is_empty());
}

#[test]
fn test_stale_present_counts_as_presented() {
    let (device, mut frame_loop) = setup(2);
    device.script_present(Err(Error::SwapchainStale(StaleReason::Suboptimal)));

    frame_loop.draw_frame().unwrap();

    assert_eq!(frame_loop.stats().frames_presented, 1);
    assert_eq!(frame_loop.stats().present_failures, 0);
    assert!(frame_loop.resize_flag().is_set());
}

// ============================================================================
// SHUTDOWN
// ============================================================================

#[test]
fn test_drop_drains_and_releases_everything() {
    let (device, mut frame_loop) = setup(2);
    for _ in 0..5 {
        frame_loop.draw_frame().unwrap();
    }
    device.clear_events();

    drop(frame_loop);

    let events = device.events();
    let idle = position(&events, "wait_idle");
    let first_cb = position(&events, "free_command_buffer");
    let chain = position(&events, "destroy_swapchain");
    let first_fence = position(&events, "destroy_fence");
    assert!(idle < first_cb);
    assert!(first_cb < chain);
    assert!(chain < first_fence);
    assert_eq!(device.total_live(), 0);
    assert!(device.violations().is_empty());
}
