/// Mock device for unit tests (no GPU required)
///
/// Simulates the device/queue context closely enough to check the frame
/// protocol: fences must be signalled before they are reset, a submission's
/// wait semaphore must have been signalled by an acquire, GPU work completes
/// when its fence is waited on, and every create has a matching destroy.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use crate::device::{
    GraphicsDevice, Extent2D, PipelineStageFlags, PresentMode, QueueFamilies, Submission,
    SurfaceCapabilities, SurfaceFormat, SurfaceSupport,
};
use crate::error::{Error, Result};
use crate::renderer::{FrameRecorder, RecordedFrame, Swapchain, SwapchainConfig, WindowSystem};

pub type Handle = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Swapchain,
    ImageView,
    Semaphore,
    Fence,
    Framebuffer,
    CommandBuffer,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubmitRecord {
    pub command_buffer: Handle,
    pub wait_semaphore: Handle,
    pub wait_stage: PipelineStageFlags,
    pub signal_semaphore: Handle,
    pub fence: Handle,
}

#[derive(Debug, Default, Clone, Copy)]
struct FenceState {
    signaled: bool,
    pending: bool,
}

struct MockState {
    next_handle: Handle,
    support: SurfaceSupport,
    events: Vec<String>,
    violations: Vec<String>,
    live: HashMap<ObjectKind, HashSet<Handle>>,
    created: HashMap<ObjectKind, usize>,
    fail_at: HashMap<ObjectKind, usize>,
    swapchain_images: HashMap<Handle, Vec<Handle>>,
    next_image: HashMap<Handle, u32>,
    swapchain_configs: Vec<SwapchainConfig>,
    fences: HashMap<Handle, FenceState>,
    signaled_semaphores: HashSet<Handle>,
    pending_command_buffers: HashMap<Handle, Handle>,
    acquire_script: VecDeque<Result<u32>>,
    present_script: VecDeque<Result<()>>,
    submit_error: Option<Error>,
    wait_idle_calls: usize,
    submissions: Vec<SubmitRecord>,
}

impl MockState {
    fn allocate(&mut self, kind: ObjectKind) -> Result<Handle> {
        let count = {
            let created = self.created.entry(kind).or_insert(0);
            *created += 1;
            *created
        };
        if self.fail_at.get(&kind) == Some(&count) {
            return Err(Error::ResourceCreationFailed(format!("mock {:?} #{}", kind, count)));
        }
        self.next_handle += 1;
        let handle = self.next_handle;
        self.live.entry(kind).or_default().insert(handle);
        Ok(handle)
    }

    fn release(&mut self, kind: ObjectKind, handle: Handle) {
        let removed = self.live.get_mut(&kind).map(|set| set.remove(&handle)).unwrap_or(false);
        if !removed {
            self.violations.push(format!("double or unknown destroy of {:?} {}", kind, handle));
        }
    }

    fn complete_fence(&mut self, fence: Handle) {
        if let Some(state) = self.fences.get_mut(&fence) {
            if state.pending {
                state.pending = false;
                state.signaled = true;
            }
        }
        self.pending_command_buffers.retain(|_, f| *f != fence);
    }

    fn has_pending_work(&self) -> bool {
        !self.pending_command_buffers.is_empty()
    }
}

/// Mock GraphicsDevice with scripted results and protocol checks
pub struct MockDevice {
    state: Mutex<MockState>,
    image_count_override: Option<u32>,
}

impl MockDevice {
    /// Device whose surface supports 1×1..4096×4096, 2..8 images, Fifo + Mailbox
    pub fn new() -> Arc<Self> {
        Self::with_support(Self::default_support())
    }

    pub fn with_support(support: SurfaceSupport) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(MockState {
                next_handle: 0,
                support,
                events: Vec::new(),
                violations: Vec::new(),
                live: HashMap::new(),
                created: HashMap::new(),
                fail_at: HashMap::new(),
                swapchain_images: HashMap::new(),
                next_image: HashMap::new(),
                swapchain_configs: Vec::new(),
                fences: HashMap::new(),
                signaled_semaphores: HashSet::new(),
                pending_command_buffers: HashMap::new(),
                acquire_script: VecDeque::new(),
                present_script: VecDeque::new(),
                submit_error: None,
                wait_idle_calls: 0,
                submissions: Vec::new(),
            }),
            image_count_override: None,
        })
    }

    /// Device that returns `count` images whatever count was requested
    pub fn with_image_count(count: u32) -> Arc<Self> {
        let mut device = Self::with_support(Self::default_support());
        if let Some(device) = Arc::get_mut(&mut device) {
            device.image_count_override = Some(count);
        }
        device
    }

    pub fn default_support() -> SurfaceSupport {
        SurfaceSupport {
            capabilities: SurfaceCapabilities {
                min_image_count: 2,
                max_image_count: 8,
                current_extent: None,
                min_image_extent: Extent2D::new(1, 1),
                max_image_extent: Extent2D::new(4096, 4096),
            },
            formats: vec![SurfaceFormat::CANONICAL],
            present_modes: vec![PresentMode::Fifo, PresentMode::Mailbox],
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    // ===== Scripting =====

    pub fn set_surface_support(&self, support: SurfaceSupport) {
        self.state().support = support;
    }

    pub fn set_current_extent(&self, extent: Option<Extent2D>) {
        self.state().support.capabilities.current_extent = extent;
    }

    /// Queue the result of a future acquire (FIFO)
    pub fn script_acquire(&self, result: Result<u32>) {
        self.state().acquire_script.push_back(result);
    }

    /// Queue the result of a future present (FIFO)
    pub fn script_present(&self, result: Result<()>) {
        self.state().present_script.push_back(result);
    }

    /// Make the next submit fail
    pub fn fail_next_submit(&self, error: Error) {
        self.state().submit_error = Some(error);
    }

    /// Make the `nth` (1-based, counted from device creation) creation of `kind` fail
    pub fn fail_creation(&self, kind: ObjectKind, nth: usize) {
        self.state().fail_at.insert(kind, nth);
    }

    // ===== Inspection =====

    pub fn events(&self) -> Vec<String> {
        self.state().events.clone()
    }

    pub fn clear_events(&self) {
        self.state().events.clear();
    }

    pub fn log_event(&self, event: impl Into<String>) {
        self.state().events.push(event.into());
    }

    /// Protocol violations observed so far (destroy of unknown objects, in-use destruction)
    pub fn violations(&self) -> Vec<String> {
        self.state().violations.clone()
    }

    pub fn live_count(&self, kind: ObjectKind) -> usize {
        self.state().live.get(&kind).map(|set| set.len()).unwrap_or(0)
    }

    pub fn total_live(&self) -> usize {
        self.state().live.values().map(|set| set.len()).sum()
    }

    pub fn created_count(&self, kind: ObjectKind) -> usize {
        self.state().created.get(&kind).copied().unwrap_or(0)
    }

    pub fn swapchain_configs(&self) -> Vec<SwapchainConfig> {
        self.state().swapchain_configs.clone()
    }

    pub fn wait_idle_calls(&self) -> usize {
        self.state().wait_idle_calls
    }

    pub fn submissions(&self) -> Vec<SubmitRecord> {
        self.state().submissions.clone()
    }

    pub fn fence_signaled(&self, fence: Handle) -> bool {
        self.state().fences.get(&fence).map(|f| f.signaled).unwrap_or(false)
    }

    // ===== Objects the recorder creates =====

    pub fn create_framebuffer(&self, view: Handle) -> Result<Handle> {
        let mut state = self.state();
        let handle = state.allocate(ObjectKind::Framebuffer)?;
        state.events.push(format!("create_framebuffer {} view={}", handle, view));
        Ok(handle)
    }

    pub fn allocate_command_buffer(&self) -> Result<Handle> {
        let mut state = self.state();
        let handle = state.allocate(ObjectKind::CommandBuffer)?;
        state.events.push(format!("allocate_command_buffer {}", handle));
        Ok(handle)
    }
}

impl GraphicsDevice for MockDevice {
    type Semaphore = Handle;
    type Fence = Handle;
    type SwapchainHandle = Handle;
    type Image = Handle;
    type ImageView = Handle;
    type Framebuffer = Handle;
    type CommandBuffer = Handle;

    fn queue_families(&self) -> QueueFamilies {
        QueueFamilies { graphics: 0, present: 0 }
    }

    fn surface_support(&self) -> Result<SurfaceSupport> {
        Ok(self.state().support.clone())
    }

    fn create_swapchain(&self, config: &SwapchainConfig) -> Result<Handle> {
        let mut state = self.state();
        state.swapchain_configs.push(*config);
        if config.extent.is_empty() {
            state.violations.push("swapchain created with a zero extent".to_string());
        }
        let handle = state.allocate(ObjectKind::Swapchain)?;
        let count = self.image_count_override.unwrap_or(config.image_count);
        let mut images = Vec::with_capacity(count as usize);
        for _ in 0..count {
            state.next_handle += 1;
            images.push(state.next_handle);
        }
        state.swapchain_images.insert(handle, images);
        state.next_image.insert(handle, 0);
        state.events.push(format!(
            "create_swapchain {} {}x{} images={}",
            handle, config.extent.width, config.extent.height, count
        ));
        Ok(handle)
    }

    fn swapchain_images(&self, swapchain: Handle) -> Result<Vec<Handle>> {
        self.state()
            .swapchain_images
            .get(&swapchain)
            .cloned()
            .ok_or_else(|| Error::InvalidResource(format!("unknown swapchain {}", swapchain)))
    }

    fn create_image_view(&self, image: Handle, _format: SurfaceFormat) -> Result<Handle> {
        let mut state = self.state();
        let handle = state.allocate(ObjectKind::ImageView)?;
        state.events.push(format!("create_image_view {} image={}", handle, image));
        Ok(handle)
    }

    fn destroy_image_view(&self, view: Handle) {
        let mut state = self.state();
        state.release(ObjectKind::ImageView, view);
        state.events.push(format!("destroy_image_view {}", view));
    }

    fn destroy_swapchain(&self, swapchain: Handle) {
        let mut state = self.state();
        if state.has_pending_work() {
            state.violations.push(format!("swapchain {} destroyed with GPU work pending", swapchain));
        }
        if state.live.get(&ObjectKind::ImageView).map(|s| !s.is_empty()).unwrap_or(false) {
            state.violations.push(format!("swapchain {} destroyed before its views", swapchain));
        }
        state.release(ObjectKind::Swapchain, swapchain);
        state.swapchain_images.remove(&swapchain);
        state.events.push(format!("destroy_swapchain {}", swapchain));
    }

    fn acquire_next_image(&self, swapchain: Handle, _timeout_ns: u64, signal: Handle) -> Result<u32> {
        let mut state = self.state();
        if !state.swapchain_images.contains_key(&swapchain) {
            return Err(Error::InvalidResource(format!("acquire on unknown swapchain {}", swapchain)));
        }
        if state.signaled_semaphores.contains(&signal) {
            return Err(Error::BackendError(format!(
                "semaphore {} already has a pending signal",
                signal
            )));
        }

        let index = match state.acquire_script.pop_front() {
            Some(Ok(index)) => index,
            Some(Err(e)) => {
                state.events.push(format!("acquire -> {}", e));
                return Err(e);
            }
            None => {
                let count = state.swapchain_images[&swapchain].len() as u32;
                let next = state.next_image.entry(swapchain).or_insert(0);
                let index = *next;
                *next = (index + 1) % count;
                index
            }
        };

        state.signaled_semaphores.insert(signal);
        state.events.push(format!("acquire {}", index));
        Ok(index)
    }

    fn present(&self, swapchain: Handle, image_index: u32, wait: Handle) -> Result<()> {
        let mut state = self.state();
        if !state.signaled_semaphores.remove(&wait) {
            state.violations.push(format!("present waits on unsignaled semaphore {}", wait));
        }
        if !state.swapchain_images.contains_key(&swapchain) {
            state.violations.push(format!("present on unknown swapchain {}", swapchain));
        }
        let result = state.present_script.pop_front().unwrap_or(Ok(()));
        match &result {
            Ok(()) => state.events.push(format!("present {}", image_index)),
            Err(e) => state.events.push(format!("present {} -> {}", image_index, e)),
        }
        result
    }

    fn create_semaphore(&self) -> Result<Handle> {
        self.state().allocate(ObjectKind::Semaphore)
    }

    fn destroy_semaphore(&self, semaphore: Handle) {
        let mut state = self.state();
        state.release(ObjectKind::Semaphore, semaphore);
        state.signaled_semaphores.remove(&semaphore);
        state.events.push(format!("destroy_semaphore {}", semaphore));
    }

    fn create_fence(&self, signaled: bool) -> Result<Handle> {
        let mut state = self.state();
        let handle = state.allocate(ObjectKind::Fence)?;
        state.fences.insert(handle, FenceState { signaled, pending: false });
        Ok(handle)
    }

    fn destroy_fence(&self, fence: Handle) {
        let mut state = self.state();
        if state.fences.get(&fence).map(|f| f.pending).unwrap_or(false) {
            state.violations.push(format!("fence {} destroyed while pending", fence));
        }
        state.release(ObjectKind::Fence, fence);
        state.fences.remove(&fence);
        state.events.push(format!("destroy_fence {}", fence));
    }

    fn wait_for_fence(&self, fence: Handle, _timeout_ns: u64) -> Result<()> {
        let mut state = self.state();
        let fence_state = state
            .fences
            .get(&fence)
            .copied()
            .ok_or_else(|| Error::InvalidResource(format!("unknown fence {}", fence)))?;
        if !fence_state.signaled && !fence_state.pending {
            return Err(Error::BackendError(format!(
                "fence {} is unsignaled with no pending work: wait would never return",
                fence
            )));
        }
        state.complete_fence(fence);
        state.events.push(format!("wait_fence {}", fence));
        Ok(())
    }

    fn reset_fence(&self, fence: Handle) -> Result<()> {
        let mut state = self.state();
        let fence_state = state
            .fences
            .get_mut(&fence)
            .ok_or_else(|| Error::InvalidResource(format!("unknown fence {}", fence)))?;
        if !fence_state.signaled || fence_state.pending {
            return Err(Error::BackendError(format!("reset of unsignaled fence {}", fence)));
        }
        fence_state.signaled = false;
        state.events.push(format!("reset_fence {}", fence));
        Ok(())
    }

    fn submit(&self, submission: &Submission<'_, Self>) -> Result<()> {
        let mut state = self.state();
        if let Some(error) = state.submit_error.take() {
            state.events.push(format!("submit -> {}", error));
            return Err(error);
        }

        let fence = *submission.fence;
        let command_buffer = *submission.command_buffer;

        match state.fences.get(&fence) {
            Some(f) if !f.signaled && !f.pending => {}
            _ => {
                return Err(Error::SubmissionFailed(format!(
                    "fence {} must be unsignaled and idle at submission",
                    fence
                )))
            }
        }
        if !state.signaled_semaphores.remove(submission.wait_semaphore) {
            return Err(Error::SubmissionFailed(format!(
                "wait semaphore {} was never signalled",
                submission.wait_semaphore
            )));
        }
        if state.pending_command_buffers.contains_key(&command_buffer) {
            state.violations.push(format!(
                "command buffer {} submitted while still pending",
                command_buffer
            ));
        }

        if let Some(f) = state.fences.get_mut(&fence) {
            f.pending = true;
        }
        state.signaled_semaphores.insert(*submission.signal_semaphore);
        state.pending_command_buffers.insert(command_buffer, fence);
        state.submissions.push(SubmitRecord {
            command_buffer,
            wait_semaphore: *submission.wait_semaphore,
            wait_stage: submission.wait_stage,
            signal_semaphore: *submission.signal_semaphore,
            fence,
        });
        state.events.push(format!("submit cb={} fence={}", command_buffer, fence));
        Ok(())
    }

    fn wait_idle(&self) -> Result<()> {
        let mut state = self.state();
        let pending: Vec<Handle> = state
            .fences
            .iter()
            .filter(|(_, f)| f.pending)
            .map(|(h, _)| *h)
            .collect();
        for fence in pending {
            state.complete_fence(fence);
        }
        state.wait_idle_calls += 1;
        state.events.push("wait_idle".to_string());
        Ok(())
    }

    fn destroy_framebuffer(&self, framebuffer: Handle) {
        let mut state = self.state();
        state.release(ObjectKind::Framebuffer, framebuffer);
        state.events.push(format!("destroy_framebuffer {}", framebuffer));
    }

    fn free_command_buffer(&self, command_buffer: Handle) {
        let mut state = self.state();
        if state.pending_command_buffers.contains_key(&command_buffer) {
            state.violations.push(format!("command buffer {} freed while pending", command_buffer));
        }
        state.release(ObjectKind::CommandBuffer, command_buffer);
        state.events.push(format!("free_command_buffer {}", command_buffer));
    }
}

// ============================================================================
// Mock FrameRecorder
// ============================================================================

/// Records one framebuffer + command buffer per image on a [`MockDevice`]
pub struct MockRecorder {
    device: Arc<MockDevice>,
    prepared: Option<Extent2D>,
    pub prepare_calls: usize,
    pub release_calls: usize,
    fail_record_at: Option<usize>,
}

impl MockRecorder {
    pub fn new(device: Arc<MockDevice>) -> Self {
        Self {
            device,
            prepared: None,
            prepare_calls: 0,
            release_calls: 0,
            fail_record_at: None,
        }
    }

    /// Fail `record` for this image index
    pub fn failing_at(mut self, image_index: usize) -> Self {
        self.fail_record_at = Some(image_index);
        self
    }

    pub fn prepared_extent(&self) -> Option<Extent2D> {
        self.prepared
    }
}

impl FrameRecorder<MockDevice> for MockRecorder {
    fn prepare(&mut self, swapchain: &Swapchain<MockDevice>) -> Result<()> {
        self.prepare_calls += 1;
        self.prepared = Some(swapchain.extent());
        self.device.log_event(format!(
            "recorder_prepare {}x{}",
            swapchain.extent().width,
            swapchain.extent().height
        ));
        Ok(())
    }

    fn record(
        &mut self,
        swapchain: &Swapchain<MockDevice>,
        image_index: usize,
    ) -> Result<RecordedFrame<MockDevice>> {
        if self.fail_record_at == Some(image_index) {
            return Err(Error::ResourceCreationFailed(format!("record image {}", image_index)));
        }
        let view = swapchain
            .image_view(image_index)
            .ok_or_else(|| Error::InvalidResource(format!("no view for image {}", image_index)))?;
        let framebuffer = self.device.create_framebuffer(view)?;
        let command_buffer = match self.device.allocate_command_buffer() {
            Ok(cb) => cb,
            Err(e) => {
                self.device.destroy_framebuffer(framebuffer);
                return Err(e);
            }
        };
        Ok(RecordedFrame { framebuffer, command_buffer })
    }

    fn release(&mut self) {
        self.release_calls += 1;
        if self.prepared.take().is_some() {
            self.device.log_event("recorder_release");
        }
    }
}

// ============================================================================
// Mock WindowSystem
// ============================================================================

/// Window whose size changes each time events are polled
pub struct MockWindow {
    pub size: Extent2D,
    /// Sizes taken one per `wait_events` call
    pub pending_sizes: VecDeque<Extent2D>,
    pub wait_calls: usize,
    pub close: bool,
    /// Request close after this many `wait_events` calls
    pub close_after_waits: Option<usize>,
}

impl MockWindow {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: Extent2D::new(width, height),
            pending_sizes: VecDeque::new(),
            wait_calls: 0,
            close: false,
            close_after_waits: None,
        }
    }

    pub fn then_sizes(mut self, sizes: &[(u32, u32)]) -> Self {
        self.pending_sizes
            .extend(sizes.iter().map(|&(w, h)| Extent2D::new(w, h)));
        self
    }
}

impl WindowSystem for MockWindow {
    fn framebuffer_size(&self) -> Extent2D {
        self.size
    }

    fn wait_events(&mut self) {
        self.wait_calls += 1;
        assert!(self.wait_calls < 10_000, "mock window never became drawable");
        if let Some(size) = self.pending_sizes.pop_front() {
            self.size = size;
        }
        if let Some(limit) = self.close_after_waits {
            if self.wait_calls >= limit {
                self.close = true;
            }
        }
    }

    fn close_requested(&self) -> bool {
        self.close
    }
}
