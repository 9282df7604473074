use crate::engine::{EventSender, MeasurementEngine};
use crate::render::init_ui;
use crate::screen::ServerRow;
use crate::settings::ServerSource;
use crate::state::UiState;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub const NO_SERVERS_MESSAGE: &str = "No servers available";

fn default_dl_url() -> String {
    "garbage.php".to_string()
}

fn default_ul_url() -> String {
    "empty.php".to_string()
}

fn default_ping_url() -> String {
    "empty.php".to_string()
}

fn default_ip_url() -> String {
    "getIP.php".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerDescriptor {
    pub name: String,
    pub server: String,
    #[serde(rename = "dlURL", default = "default_dl_url")]
    pub dl_url: String,
    #[serde(rename = "ulURL", default = "default_ul_url")]
    pub ul_url: String,
    #[serde(rename = "pingURL", default = "default_ping_url")]
    pub ping_url: String,
    #[serde(rename = "getIpURL", default = "default_ip_url")]
    pub get_ip_url: String,
    /// Best latency seen while ranking; `None` until measured or when unreachable.
    #[serde(skip)]
    pub ping_ms: Option<f64>,
}

impl ServerDescriptor {
    pub fn cloudflare() -> Self {
        Self {
            name: "Cloudflare".to_string(),
            server: "https://speed.cloudflare.com/".to_string(),
            dl_url: "__down".to_string(),
            ul_url: "__up".to_string(),
            ping_url: "__down?bytes=0".to_string(),
            get_ip_url: "cdn-cgi/trace".to_string(),
            ping_ms: None,
        }
    }

    pub fn is_reachable(&self) -> bool {
        self.ping_ms.is_some()
    }

    fn resolve(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        let base = if self.server.starts_with("//") {
            format!("https:{}", self.server)
        } else {
            self.server.clone()
        };
        match (base.ends_with('/'), path.starts_with('/')) {
            (true, true) => format!("{}{}", base, &path[1..]),
            (false, false) => format!("{}/{}", base, path),
            _ => format!("{}{}", base, path),
        }
    }

    fn with_query(url: String, query: &str) -> String {
        let sep = if url.contains('?') { '&' } else { '?' };
        format!("{}{}{}", url, sep, query)
    }

    /// `ckSize` is read by LibreSpeed backends, `bytes` by Cloudflare; each
    /// ignores the other.
    pub fn download_url(&self, bytes: u64) -> String {
        let chunks = bytes.div_ceil(1_000_000).clamp(1, 1024);
        Self::with_query(
            self.resolve(&self.dl_url),
            &format!("ckSize={}&bytes={}", chunks, bytes),
        )
    }

    pub fn upload_url(&self) -> String {
        self.resolve(&self.ul_url)
    }

    pub fn ping_url(&self) -> String {
        self.resolve(&self.ping_url)
    }

    pub fn ip_url(&self) -> String {
        self.resolve(&self.get_ip_url)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorState {
    Idle,
    LoadingList,
    Ranking,
    /// No server context; the test UI runs against the fallback endpoints.
    Bare,
    NoServers,
    Ready,
}

pub struct ServerSelector {
    servers: Vec<ServerDescriptor>,
    state: SelectorState,
    selected: Option<usize>,
}

impl Default for ServerSelector {
    fn default() -> Self {
        Self {
            servers: Vec::new(),
            state: SelectorState::Idle,
            selected: None,
        }
    }
}

impl ServerSelector {
    pub fn state(&self) -> SelectorState {
        self.state
    }

    pub fn servers(&self) -> &[ServerDescriptor] {
        &self.servers
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn mark_selected(&mut self, index: usize) {
        self.selected = Some(index);
    }

    pub fn begin<E: MeasurementEngine + ?Sized>(
        &mut self,
        source: &ServerSource,
        engine: &mut E,
        ui: &mut UiState,
        events: &EventSender,
    ) {
        match source {
            ServerSource::Reference(reference) => {
                info!(reference = %reference, "loading server list");
                self.state = SelectorState::LoadingList;
                engine.load_server_list(reference, events.clone());
            }
            ServerSource::Inline(list) if list.is_empty() => self.show_bare(ui),
            ServerSource::Inline(list) => {
                self.servers = list.clone();
                self.run_select(engine, events);
            }
        }
    }

    pub fn on_list_loaded<E: MeasurementEngine + ?Sized>(
        &mut self,
        servers: Option<Vec<ServerDescriptor>>,
        engine: &mut E,
        ui: &mut UiState,
        events: &EventSender,
    ) {
        match servers {
            Some(list) if !list.is_empty() => {
                self.servers = list;
                self.run_select(engine, events);
            }
            _ => {
                warn!("server list empty or unavailable, continuing without server selection");
                self.show_bare(ui);
            }
        }
    }

    pub fn on_ranked(
        &mut self,
        servers: Vec<ServerDescriptor>,
        best: Option<usize>,
        ui: &mut UiState,
    ) {
        self.servers = servers;

        let Some(best) = best.filter(|&i| i < self.servers.len()) else {
            warn!("no reachable server");
            ui.screen.message = NO_SERVERS_MESSAGE.to_string();
            self.state = SelectorState::NoServers;
            return;
        };

        let screen = &mut ui.screen;
        screen.loading = false;
        screen.server_list = self
            .servers
            .iter()
            .enumerate()
            .filter_map(|(index, server)| {
                server.ping_ms.map(|ping| ServerRow {
                    index,
                    name: server.name.clone(),
                    ping: format!("Ping: {:.0} ms", ping),
                })
            })
            .collect();
        screen.selected_server_name = self.servers[best].name.clone();
        screen.server_area = screen.server_list.len() > 1;
        screen.test_wrapper = true;

        self.selected = Some(best);
        self.state = SelectorState::Ready;
        info!(server = %self.servers[best].name, "server selected");

        init_ui(ui);
    }

    fn run_select<E>(&mut self, engine: &mut E, events: &EventSender)
    where
        E: MeasurementEngine + ?Sized,
    {
        self.state = SelectorState::Ranking;
        engine.add_test_points(self.servers.clone());
        engine.select_server(events.clone());
    }

    fn show_bare(&mut self, ui: &mut UiState) {
        self.state = SelectorState::Bare;
        ui.screen.loading = false;
        ui.screen.server_area = false;
        ui.screen.test_wrapper = true;
        init_ui(ui);
    }
}
