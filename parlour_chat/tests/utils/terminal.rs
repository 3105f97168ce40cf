use async_trait::async_trait;
use parking_lot::Mutex;
use parlour_chat::{utils::strip_ansi, Terminal};
use parlour_listener::{AutocompleteCallback, ConnectionError, Input, WindowSize};
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// An in-memory terminal. Input is scripted through the `send_*` methods and
/// everything written is recorded.
pub struct MockTerminal {
    address: IpAddr,
    login: Option<String>,
    input_tx: Mutex<Option<mpsc::UnboundedSender<Result<Input, ConnectionError>>>>,
    input_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Result<Input, ConnectionError>>>,
    output: Mutex<String>,
    written: watch::Sender<usize>,
    prompt: Mutex<String>,
    bracketed_paste: AtomicBool,
    autocomplete: Mutex<Option<AutocompleteCallback>>,
    window: watch::Sender<WindowSize>,
    closed: AtomicBool,
    fail_writes: AtomicBool,
}

impl MockTerminal {
    pub fn new(address: &str, login: Option<&str>) -> Arc<Self> {
        let (input_tx, input_rx) = mpsc::unbounded_channel();
        let (written, _) = watch::channel(0);
        let (window, _) = watch::channel(WindowSize::default());
        Arc::new(Self {
            address: address.parse().unwrap(),
            login: login.map(str::to_owned),
            input_tx: Mutex::new(Some(input_tx)),
            input_rx: tokio::sync::Mutex::new(input_rx),
            output: Mutex::new(String::new()),
            written,
            prompt: Mutex::new(String::new()),
            bracketed_paste: AtomicBool::new(false),
            autocomplete: Mutex::new(None),
            window,
            closed: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
        })
    }

    fn push(&self, input: Result<Input, ConnectionError>) {
        if let Some(tx) = self.input_tx.lock().as_ref() {
            let _ = tx.send(input);
        }
    }

    pub fn send_line(&self, line: &str) {
        self.push(Ok(Input::Line(line.to_owned())));
    }

    /// Send a bracketed paste: every line but the last is a continuation.
    pub fn send_paste(&self, lines: &[&str]) {
        let (last, rest) = lines.split_last().unwrap();
        for line in rest {
            self.push(Ok(Input::PasteLine(line.to_string())));
        }
        self.push(Ok(Input::Line(last.to_string())));
    }

    /// Make the pending read fail as a reset socket would.
    pub fn break_input(&self) {
        self.push(Err(ConnectionError::IoError("connection reset".to_owned())));
    }

    /// Simulate the client disconnecting.
    pub fn hang_up(&self) {
        self.input_tx.lock().take();
    }

    pub fn resize(&self, width: usize, height: usize) {
        self.window.send_replace(WindowSize { width, height });
    }

    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    pub fn raw_output(&self) -> String {
        self.output.lock().clone()
    }

    /// Everything written so far, with escape sequences removed.
    pub fn output(&self) -> String {
        strip_ansi(&self.raw_output())
    }

    pub fn clear_output(&self) {
        self.output.lock().clear();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn bracketed_paste(&self) -> bool {
        self.bracketed_paste.load(Ordering::SeqCst)
    }

    pub fn current_prompt(&self) -> String {
        self.prompt.lock().clone()
    }

    pub fn complete(&self, line: &str) -> Option<String> {
        let callback = self.autocomplete.lock();
        let callback = callback.as_ref()?;
        callback(line, line.len()).map(|(completed, _)| completed)
    }

    /// Wait until the plain output contains `needle`, returning the output.
    pub async fn wait_for(&self, needle: &str) -> String {
        let mut written = self.written.subscribe();
        let found = tokio::time::timeout(super::WAIT, async {
            loop {
                let output = self.output();
                if output.contains(needle) {
                    return output;
                }
                if written.changed().await.is_err() {
                    return output;
                }
            }
        })
        .await;

        match found {
            Ok(output) => output,
            Err(_) => panic!("timed out waiting for {:?} in {:?}", needle, self.output()),
        }
    }

    pub async fn wait_closed(&self) {
        let mut written = self.written.subscribe();
        tokio::time::timeout(super::WAIT, async {
            while !self.is_closed() {
                let _ = written.changed().await;
            }
        })
        .await
        .expect("terminal was not closed");
    }
}

#[async_trait]
impl Terminal for MockTerminal {
    fn remote_addr(&self) -> IpAddr {
        self.address
    }

    fn login_name(&self) -> Option<String> {
        self.login.clone()
    }

    fn public_key(&self) -> Option<Vec<u8>> {
        None
    }

    async fn read_line(&self) -> Result<Input, ConnectionError> {
        let mut input = self.input_rx.lock().await;
        input.recv().await.unwrap_or(Ok(Input::Eof))
    }

    fn write(&self, text: String) -> Result<(), ConnectionError> {
        if self.is_closed() {
            return Err(ConnectionError::Closed);
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(ConnectionError::IoError("broken pipe".to_owned()));
        }
        self.output.lock().push_str(&text);
        self.written.send_modify(|n| *n += 1);
        Ok(())
    }

    fn set_prompt(&self, prompt: &str) {
        *self.prompt.lock() = prompt.to_owned();
    }

    fn set_bracketed_paste(&self, enabled: bool) -> Result<(), ConnectionError> {
        self.bracketed_paste.store(enabled, Ordering::SeqCst);
        Ok(())
    }

    fn set_autocomplete(&self, callback: AutocompleteCallback) {
        *self.autocomplete.lock() = Some(callback);
    }

    fn window_size(&self) -> watch::Receiver<WindowSize> {
        self.window.subscribe()
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.input_tx.lock().take();
        self.written.send_modify(|n| *n += 1);
    }
}
