// Wayland integration module
// Preview window and keyboard input using smithay-client-toolkit

use crate::error::BrowseError;
use crate::image_loader::Frame;
use crate::navigator::{Display, Key};
use anyhow::{anyhow, Context, Result};
use log::{debug, error, info, warn};
use smithay_client_toolkit::{
    compositor::{CompositorHandler, CompositorState},
    delegate_compositor, delegate_keyboard, delegate_layer, delegate_output, delegate_registry,
    delegate_seat, delegate_shm,
    output::{OutputHandler, OutputState},
    registry::{ProvidesRegistryState, RegistryState},
    registry_handlers,
    seat::{
        keyboard::{KeyEvent, KeyboardHandler, Keysym, Modifiers},
        Capability, SeatHandler, SeatState,
    },
    shell::{
        wlr_layer::{
            Anchor, KeyboardInteractivity, Layer, LayerShell, LayerShellHandler, LayerSurface,
            LayerSurfaceConfigure,
        },
        WaylandSurface,
    },
    shm::{
        slot::{Buffer, SlotPool},
        Shm, ShmHandler,
    },
};
use std::collections::VecDeque;
use wayland_client::{
    globals::registry_queue_init,
    protocol::{wl_keyboard, wl_output, wl_seat, wl_shm, wl_surface},
    Connection, EventQueue, QueueHandle,
};

/// Wayland client state driven by the event queue
struct WaylandApp {
    // Registry state
    registry_state: RegistryState,
    // Seat state for input handling
    seat_state: SeatState,
    // Output state for display info
    output_state: OutputState,
    // Shared memory for buffer allocation
    shm: Shm,
    // Layer shell for the preview surface
    layer_shell: LayerShell,
    // Compositor state
    compositor_state: CompositorState,

    // Namespace given to the layer surface
    window_name: String,

    // Surface and buffer management
    layer_surface: Option<LayerSurface>,
    pool: Option<SlotPool>,
    buffer: Option<Buffer>,
    configured: bool,

    // Frame currently on screen, redrawn on every configure
    frame: Option<Frame>,

    keyboard: Option<wl_keyboard::WlKeyboard>,
    // Key presses not yet handed to the browser
    pending_keys: VecDeque<Key>,
    // The compositor closed our surface
    closed: bool,
    // Failure of a draw that ran inside an event callback
    draw_error: DeferredError,
}

/// Holds an error raised inside a Wayland callback until the caller that
/// triggered the dispatch can return it
#[derive(Debug, Default)]
struct DeferredError(Option<anyhow::Error>);

impl DeferredError {
    fn record(&mut self, result: Result<()>) {
        if let Err(e) = result {
            error!("Failed to draw preview: {:#}", e);
            // First failure wins
            if self.0.is_none() {
                self.0 = Some(e);
            }
        }
    }

    fn take(&mut self) -> Result<()> {
        match self.0.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl WaylandApp {
    /// Copy the current frame into a shared memory buffer and commit it
    fn draw(&mut self) -> Result<()> {
        if !self.configured {
            return Ok(());
        }
        let (Some(layer_surface), Some(frame)) = (self.layer_surface.as_ref(), self.frame.as_ref())
        else {
            return Ok(());
        };

        let width = frame.width;
        let height = frame.height;

        // Calculate buffer size (4 bytes per pixel for ARGB)
        let stride = width as i32 * 4;
        let buffer_size = frame.bgra_data.len();
        debug!("Drawing {}x{} frame ({} bytes)", width, height, buffer_size);

        // Initialize pool if needed
        if self.pool.is_none() {
            self.pool =
                Some(SlotPool::new(buffer_size, &self.shm).context("Failed to create slot pool")?);
        }
        let Some(pool) = self.pool.as_mut() else {
            return Ok(());
        };

        // Resize pool if needed
        if pool.len() < buffer_size {
            pool.resize(buffer_size)
                .with_context(|| format!("Failed to resize pool to {} bytes", buffer_size))?;
        }

        let (buffer, canvas) = pool
            .create_buffer(width as i32, height as i32, stride, wl_shm::Format::Argb8888)
            .with_context(|| format!("Failed to create buffer {}x{}", width, height))?;
        canvas.copy_from_slice(&frame.bgra_data);

        // Attach and commit
        let surface = layer_surface.wl_surface();
        buffer
            .attach_to(surface)
            .map_err(|e| anyhow!("Failed to attach buffer: {:?}", e))?;
        surface.damage_buffer(0, 0, width as i32, height as i32);
        surface.commit();

        self.buffer = Some(buffer);
        Ok(())
    }

    /// Top-left margins that center a `width` x `height` surface on screen
    fn centered_margins(&self, width: u32, height: u32) -> (i32, i32) {
        match get_display_dimensions(&self.output_state) {
            Some((display_width, display_height)) => (
                (display_width.saturating_sub(width) / 2) as i32,
                (display_height.saturating_sub(height) / 2) as i32,
            ),
            None => (0, 0),
        }
    }
}

// Implement required traits for smithay-client-toolkit

impl CompositorHandler for WaylandApp {
    fn scale_factor_changed(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _new_factor: i32,
    ) {
        debug!("Scale factor changed");
    }

    fn transform_changed(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _new_transform: wl_output::Transform,
    ) {
        debug!("Transform changed");
    }

    fn frame(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _time: u32,
    ) {
    }

    fn surface_enter(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _output: &wl_output::WlOutput,
    ) {
    }

    fn surface_leave(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _output: &wl_output::WlOutput,
    ) {
    }
}

impl OutputHandler for WaylandApp {
    fn output_state(&mut self) -> &mut OutputState {
        &mut self.output_state
    }

    fn new_output(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _output: wl_output::WlOutput,
    ) {
        debug!("New output detected");
    }

    fn update_output(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _output: wl_output::WlOutput,
    ) {
        debug!("Output updated");
    }

    fn output_destroyed(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _output: wl_output::WlOutput,
    ) {
        debug!("Output destroyed");
    }
}

impl LayerShellHandler for WaylandApp {
    fn closed(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, _layer: &LayerSurface) {
        warn!("Preview surface closed by the compositor");
        self.closed = true;
    }

    fn configure(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _layer: &LayerSurface,
        configure: LayerSurfaceConfigure,
        _serial: u32,
    ) {
        debug!("Layer surface configured: {:?}", configure);

        self.configured = true;
        let result = self.draw();
        self.draw_error.record(result);
    }
}

impl SeatHandler for WaylandApp {
    fn seat_state(&mut self) -> &mut SeatState {
        &mut self.seat_state
    }

    fn new_seat(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, _seat: wl_seat::WlSeat) {
        debug!("New seat");
    }

    fn new_capability(
        &mut self,
        _conn: &Connection,
        qh: &QueueHandle<Self>,
        seat: wl_seat::WlSeat,
        capability: Capability,
    ) {
        debug!("New capability: {:?}", capability);

        if capability == Capability::Keyboard && self.keyboard.is_none() {
            match self.seat_state.get_keyboard(qh, &seat, None) {
                Ok(keyboard) => self.keyboard = Some(keyboard),
                Err(e) => error!("Failed to get keyboard: {}", e),
            }
        }
    }

    fn remove_capability(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _seat: wl_seat::WlSeat,
        capability: Capability,
    ) {
        debug!("Capability removed: {:?}", capability);

        if capability == Capability::Keyboard {
            if let Some(keyboard) = self.keyboard.take() {
                keyboard.release();
            }
            warn!("Keyboard removed, key presses can no longer be received");
        }
    }

    fn remove_seat(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, _seat: wl_seat::WlSeat) {
        debug!("Seat removed");
    }
}

impl KeyboardHandler for WaylandApp {
    fn enter(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _keyboard: &wl_keyboard::WlKeyboard,
        _surface: &wl_surface::WlSurface,
        _serial: u32,
        _raw: &[u32],
        _keysyms: &[Keysym],
    ) {
        debug!("Keyboard entered surface");
    }

    fn leave(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _keyboard: &wl_keyboard::WlKeyboard,
        _surface: &wl_surface::WlSurface,
        _serial: u32,
    ) {
        debug!("Keyboard left surface");
    }

    fn press_key(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _keyboard: &wl_keyboard::WlKeyboard,
        _serial: u32,
        event: KeyEvent,
    ) {
        debug!("Key pressed: {:?}", event.keysym);
        if let Some(key) = key_from_event(&event) {
            self.pending_keys.push_back(key);
        }
    }

    fn release_key(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _keyboard: &wl_keyboard::WlKeyboard,
        _serial: u32,
        _event: KeyEvent,
    ) {
    }

    fn update_modifiers(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _keyboard: &wl_keyboard::WlKeyboard,
        _serial: u32,
        _modifiers: Modifiers,
        _layout: u32,
    ) {
    }
}

impl ShmHandler for WaylandApp {
    fn shm_state(&mut self) -> &mut Shm {
        &mut self.shm
    }
}

impl ProvidesRegistryState for WaylandApp {
    fn registry(&mut self) -> &mut RegistryState {
        &mut self.registry_state
    }

    registry_handlers![OutputState, SeatState];
}

// Delegate macros
delegate_compositor!(WaylandApp);
delegate_output!(WaylandApp);
delegate_layer!(WaylandApp);
delegate_seat!(WaylandApp);
delegate_keyboard!(WaylandApp);
delegate_shm!(WaylandApp);
delegate_registry!(WaylandApp);

/// Preview window on a Wayland compositor, reused for the whole session
pub struct WaylandDisplay {
    conn: Connection,
    event_queue: EventQueue<WaylandApp>,
    qh: QueueHandle<WaylandApp>,
    app: WaylandApp,
}

impl WaylandDisplay {
    /// Connect to the compositor and bind the globals the preview needs
    pub fn connect(window_name: &str) -> Result<Self> {
        info!("Connecting to Wayland display");

        // Connect to Wayland display
        let conn = Connection::connect_to_env()
            .map_err(|e| BrowseError::NoDisplay(e.to_string()))?;

        // Initialize registry and event queue
        let (globals, mut event_queue) =
            registry_queue_init(&conn).context("Failed to initialize registry")?;
        let qh = event_queue.handle();

        // Initialize required globals
        let compositor_state =
            CompositorState::bind(&globals, &qh).context("Failed to bind compositor")?;
        let layer_shell = LayerShell::bind(&globals, &qh)
            .map_err(|e| BrowseError::NoDisplay(format!("layer shell unavailable: {}", e)))?;
        let shm = Shm::bind(&globals, &qh).context("Failed to bind shm")?;

        let mut app = WaylandApp {
            registry_state: RegistryState::new(&globals),
            seat_state: SeatState::new(&globals, &qh),
            output_state: OutputState::new(&globals, &qh),
            shm,
            layer_shell,
            compositor_state,
            window_name: window_name.to_string(),
            layer_surface: None,
            pool: None,
            buffer: None,
            configured: false,
            frame: None,
            keyboard: None,
            pending_keys: VecDeque::new(),
            closed: false,
            draw_error: DeferredError::default(),
        };

        // Dispatch once to get output and seat info
        event_queue.roundtrip(&mut app)?;

        if app.keyboard.is_none() {
            warn!("No keyboard available yet");
        }
        match get_display_dimensions(&app.output_state) {
            Some((w, h)) => info!("Display dimensions: {}x{}", w, h),
            None => info!("Display dimensions unknown"),
        }

        Ok(Self {
            conn,
            event_queue,
            qh,
            app,
        })
    }
}

impl Display for WaylandDisplay {
    fn show(&mut self, frame: &Frame) -> Result<()> {
        let (margin_left, margin_top) = self.app.centered_margins(frame.width, frame.height);
        self.app.frame = Some(frame.clone());

        match self.app.layer_surface.as_ref() {
            Some(layer_surface) => {
                layer_surface.set_margin(margin_top, 0, 0, margin_left);
                layer_surface.set_size(frame.width, frame.height);
                self.app.draw()?;
            }
            None => {
                // Create the layer surface
                let surface = self.app.compositor_state.create_surface(&self.qh);
                let layer_surface = self.app.layer_shell.create_layer_surface(
                    &self.qh,
                    surface,
                    Layer::Overlay,
                    Some(self.app.window_name.clone()),
                    None,
                );

                // Anchor top-left and position through margins
                layer_surface.set_anchor(Anchor::TOP | Anchor::LEFT);
                layer_surface.set_margin(margin_top, 0, 0, margin_left);
                layer_surface.set_size(frame.width, frame.height);
                layer_surface.set_keyboard_interactivity(KeyboardInteractivity::Exclusive);

                // Commit the surface to trigger configure
                layer_surface.commit();
                self.app.layer_surface = Some(layer_surface);
            }
        }

        self.event_queue.roundtrip(&mut self.app)?;
        self.app.draw_error.take()
    }

    fn wait_for_key(&mut self) -> Result<Key> {
        loop {
            if let Some(key) = self.app.pending_keys.pop_front() {
                return Ok(key);
            }
            if self.app.closed {
                return Ok(Key::Closed);
            }
            self.event_queue.blocking_dispatch(&mut self.app)?;
            self.app.draw_error.take()?;
        }
    }

    fn close(&mut self) -> Result<()> {
        if self.app.layer_surface.is_none() {
            return Ok(());
        }

        // Dropping the layer surface destroys it on the compositor side
        self.app.layer_surface = None;
        self.app.buffer = None;
        self.app.pool = None;
        self.app.frame = None;
        self.app.configured = false;
        self.conn.flush().context("Failed to flush Wayland connection")?;
        debug!("Preview surface destroyed");
        Ok(())
    }

    fn screen_size(&self) -> Option<(u32, u32)> {
        get_display_dimensions(&self.app.output_state)
    }
}

/// Get display dimensions from the output state
fn get_display_dimensions(output_state: &OutputState) -> Option<(u32, u32)> {
    for output in output_state.outputs() {
        if let Some(info) = output_state.info(&output) {
            if let Some(mode) = info.modes.iter().find(|m| m.current) {
                return Some((mode.dimensions.0 as u32, mode.dimensions.1 as u32));
            }
            if let Some(mode) = info.modes.first() {
                return Some((mode.dimensions.0 as u32, mode.dimensions.1 as u32));
            }
        }
    }
    None
}

/// Translate a key event into the browser's key type.
///
/// Modifier keys yield nothing: Shift+N arrives as a bare Shift press
/// followed by the `N` press.
fn key_from_event(event: &KeyEvent) -> Option<Key> {
    key_from_parts(event.keysym, event.utf8.as_deref())
}

fn key_from_parts(keysym: Keysym, text: Option<&str>) -> Option<Key> {
    if keysym.is_modifier_key() {
        return None;
    }
    if let Some(c) = text.and_then(single_char) {
        return Some(Key::Char(c));
    }
    Some(key_from_keysym(keysym))
}

fn key_from_keysym(keysym: Keysym) -> Key {
    match keysym {
        Keysym::space => Key::Char(' '),
        Keysym::n => Key::Char('n'),
        Keysym::N => Key::Char('N'),
        Keysym::p => Key::Char('p'),
        Keysym::P => Key::Char('P'),
        Keysym::q => Key::Char('q'),
        Keysym::Q => Key::Char('Q'),
        _ => Key::Other,
    }
}

fn single_char(text: &str) -> Option<char> {
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keysyms_without_text_still_map() {
        assert_eq!(key_from_keysym(Keysym::space), Key::Char(' '));
        assert_eq!(key_from_keysym(Keysym::Q), Key::Char('Q'));
        assert_eq!(key_from_keysym(Keysym::Escape), Key::Other);
    }

    #[test]
    fn modifier_presses_queue_nothing() {
        for keysym in [Keysym::Shift_L, Keysym::Shift_R, Keysym::Control_L, Keysym::Caps_Lock] {
            assert_eq!(key_from_parts(keysym, None), None);
        }
    }

    #[test]
    fn shifted_letters_arrive_as_uppercase() {
        assert_eq!(key_from_parts(Keysym::N, Some("N")), Some(Key::Char('N')));
        assert_eq!(key_from_parts(Keysym::Q, None), Some(Key::Char('Q')));
        assert_eq!(key_from_parts(Keysym::Escape, None), Some(Key::Other));
    }

    #[test]
    fn callback_draw_failure_is_returned_once() {
        let mut deferred = DeferredError::default();
        deferred.record(Ok(()));
        assert!(deferred.take().is_ok());

        deferred.record(Err(anyhow!("Failed to create slot pool")));
        deferred.record(Err(anyhow!("Failed to create buffer 4x4")));
        let err = deferred.take().unwrap_err();
        assert_eq!(err.to_string(), "Failed to create slot pool");
        assert!(deferred.take().is_ok());
    }

    #[test]
    fn only_single_characters_count_as_text() {
        assert_eq!(single_char("n"), Some('n'));
        assert_eq!(single_char(""), None);
        assert_eq!(single_char("ab"), None);
    }
}
