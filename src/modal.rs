use crate::engine::MeasurementEngine;
use crate::error::{Error, Result};
use crate::screen::Screen;
use crate::servers::ServerSelector;
use tracing::info;

/// The server picker overlay. The cursor walks the rendered rows, which may
/// skip unreachable servers.
#[derive(Debug, Default)]
pub struct ModalController {
    cursor: usize,
}

impl ModalController {
    pub fn open(&mut self, screen: &mut Screen) {
        screen.modal_open = true;
        self.cursor = self.cursor.min(screen.server_list.len().saturating_sub(1));
    }

    pub fn close(&mut self, screen: &mut Screen) {
        screen.modal_open = false;
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn next(&mut self, screen: &Screen) {
        if !screen.server_list.is_empty() {
            self.cursor = (self.cursor + 1) % screen.server_list.len();
        }
    }

    pub fn prev(&mut self, screen: &Screen) {
        let len = screen.server_list.len();
        if len > 0 {
            self.cursor = (self.cursor + len - 1) % len;
        }
    }

    pub fn highlighted(&self, screen: &Screen) -> Option<usize> {
        screen.server_list.get(self.cursor).map(|row| row.index)
    }

    /// Makes `index` (a position in the full server list) the engine's target.
    pub fn select_server<E: MeasurementEngine + ?Sized>(
        &mut self,
        index: usize,
        selector: &mut ServerSelector,
        engine: &mut E,
        screen: &mut Screen,
    ) -> Result<()> {
        if engine.state().is_running() {
            return Err(Error::RunInProgress);
        }
        let servers = selector.servers();
        let server = servers
            .get(index)
            .cloned()
            .ok_or(Error::ServerOutOfRange {
                index,
                len: servers.len(),
            })?;
        if !server.is_reachable() {
            return Err(Error::ServerUnreachable(server.name));
        }

        engine.set_selected_server(&server)?;
        selector.mark_selected(index);
        screen.selected_server_name = server.name.clone();
        info!(server = %server.name, "server changed");
        self.close(screen);
        Ok(())
    }
}
