//! Terminal rendering of markdown message bodies.

use crate::utils::visible_len;

use pulldown_cmark::{Event, Options, Parser, Tag};

/// Converts a markdown message body into terminal text.
///
/// `margin` is the number of columns already used on the first line (by the
/// sender label); continuation lines are indented by that amount so the body
/// lines up. `width` is the receiver's terminal width.
pub trait MarkdownRenderer: Send + Sync {
    fn render(&self, source: &str, margin: usize, width: usize) -> String;
}

/// The default renderer: inline styles become SGR sequences and text is
/// word-wrapped to the space right of the margin.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalMarkdown;

/// Leaves the source untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainText;

impl MarkdownRenderer for PlainText {
    fn render(&self, source: &str, _margin: usize, _width: usize) -> String {
        source.to_owned()
    }
}

enum Frame {
    Style(&'static str),
    Heading,
    Block,
    Quote,
    List(Option<u64>),
    Item(usize),
    CodeBlock,
    Link { dest: String, text: String },
    Image,
    Other,
}

struct Layout {
    avail: usize,
    lines: Vec<String>,
    line: String,
    col: usize,
    prefix_width: usize,
    started: bool,
    quote_depth: usize,
    indent: usize,
}

impl Layout {
    fn new(avail: usize) -> Self {
        Self {
            avail,
            lines: Vec::new(),
            line: String::new(),
            col: 0,
            prefix_width: 0,
            started: false,
            quote_depth: 0,
            indent: 0,
        }
    }

    fn begin_line(&mut self) {
        if self.started {
            return;
        }
        let prefix = format!("{}{}", "│ ".repeat(self.quote_depth), " ".repeat(self.indent));
        self.prefix_width = visible_len(&prefix);
        self.col = self.prefix_width;
        self.line.push_str(&prefix);
        self.started = true;
    }

    fn end_line(&mut self) {
        if self.started {
            self.lines.push(std::mem::take(&mut self.line));
            self.started = false;
            self.col = 0;
        }
    }

    /// Push text that must not be wrapped, such as style sequences or list markers.
    fn push_raw(&mut self, s: &str) {
        self.begin_line();
        self.line.push_str(s);
        self.col += visible_len(s);
    }

    fn push_words(&mut self, text: &str) {
        for (i, segment) in text.split('\n').enumerate() {
            if i > 0 {
                self.end_line();
            }
            for piece in segment.split_inclusive(' ') {
                self.begin_line();
                let word = visible_len(piece.trim_end_matches(' '));
                if self.col > self.prefix_width && self.col + word > self.avail {
                    self.end_line();
                    self.begin_line();
                    let piece = piece.trim_start_matches(' ');
                    self.line.push_str(piece);
                    self.col += visible_len(piece);
                } else {
                    self.line.push_str(piece);
                    self.col += visible_len(piece);
                }
            }
        }
    }

    fn finish(mut self, margin: usize) -> String {
        self.end_line();
        let pad = " ".repeat(margin);
        let mut out = String::new();
        for (i, line) in self.lines.iter().enumerate() {
            if i > 0 {
                out.push('\n');
                out.push_str(&pad);
            }
            out.push_str(line);
        }
        out
    }
}

fn closing_sequence(open: &str) -> &'static str {
    match open {
        "\x1b[1m" => "\x1b[22m",
        "\x1b[3m" => "\x1b[23m",
        "\x1b[9m" => "\x1b[29m",
        _ => "\x1b[0m",
    }
}

impl MarkdownRenderer for TerminalMarkdown {
    fn render(&self, source: &str, margin: usize, width: usize) -> String {
        let mut layout = Layout::new(width.saturating_sub(margin).max(1));
        let mut stack: Vec<Frame> = Vec::new();

        for event in Parser::new_ext(source, Options::ENABLE_STRIKETHROUGH) {
            match event {
                Event::Start(tag) => {
                    let frame = match tag {
                        Tag::Strong => Frame::Style("\x1b[1m"),
                        Tag::Emphasis => Frame::Style("\x1b[3m"),
                        Tag::Strikethrough => Frame::Style("\x1b[9m"),
                        Tag::Heading { .. } => {
                            layout.end_line();
                            layout.push_raw("\x1b[1m");
                            Frame::Heading
                        }
                        Tag::Paragraph => Frame::Block,
                        Tag::BlockQuote(_) => {
                            layout.end_line();
                            layout.quote_depth += 1;
                            Frame::Quote
                        }
                        Tag::List(start) => {
                            layout.end_line();
                            Frame::List(start)
                        }
                        Tag::Item => {
                            layout.end_line();
                            let marker = match stack.iter_mut().rev().find_map(|f| match f {
                                Frame::List(n) => Some(n),
                                _ => None,
                            }) {
                                Some(Some(n)) => {
                                    let marker = format!("{}. ", n);
                                    *n += 1;
                                    marker
                                }
                                _ => "• ".to_owned(),
                            };
                            layout.push_raw(&marker);
                            let marker_width = visible_len(&marker);
                            layout.indent += marker_width;
                            Frame::Item(marker_width)
                        }
                        Tag::CodeBlock(_) => {
                            layout.end_line();
                            layout.indent += 2;
                            Frame::CodeBlock
                        }
                        Tag::Link { dest_url, .. } => {
                            layout.push_raw("\x1b[4m");
                            Frame::Link {
                                dest: dest_url.to_string(),
                                text: String::new(),
                            }
                        }
                        Tag::Image { .. } => {
                            layout.push_raw("[");
                            Frame::Image
                        }
                        _ => Frame::Other,
                    };
                    if let Frame::Style(open) = frame {
                        layout.push_raw(open);
                    }
                    stack.push(frame);
                }
                Event::End(_) => match stack.pop() {
                    Some(Frame::Style(open)) => layout.push_raw(closing_sequence(open)),
                    Some(Frame::Heading) => {
                        layout.push_raw("\x1b[22m");
                        layout.end_line();
                    }
                    Some(Frame::Block) => layout.end_line(),
                    Some(Frame::Quote) => {
                        layout.end_line();
                        layout.quote_depth -= 1;
                    }
                    Some(Frame::List(_)) => layout.end_line(),
                    Some(Frame::Item(width)) => {
                        layout.end_line();
                        layout.indent -= width;
                    }
                    Some(Frame::CodeBlock) => {
                        layout.end_line();
                        layout.indent -= 2;
                    }
                    Some(Frame::Link { dest, text }) => {
                        layout.push_raw("\x1b[24m");
                        if !dest.is_empty() && dest != text {
                            layout.push_words(&format!(" ({})", dest));
                        }
                    }
                    Some(Frame::Image) => layout.push_raw("]"),
                    Some(Frame::Other) | None => {}
                },
                Event::Text(text) => {
                    if let Some(Frame::Link { text: link_text, .. }) = stack.last_mut() {
                        link_text.push_str(&text);
                    }
                    if matches!(stack.last(), Some(Frame::CodeBlock)) {
                        let text = text.strip_suffix('\n').unwrap_or(&text);
                        for (i, line) in text.split('\n').enumerate() {
                            if i > 0 {
                                layout.end_line();
                            }
                            layout.push_raw(line);
                        }
                    } else {
                        layout.push_words(&text);
                    }
                }
                Event::Code(code) => {
                    layout.push_raw("\x1b[36m");
                    layout.push_words(&code);
                    layout.push_raw("\x1b[39m");
                }
                Event::Html(html) | Event::InlineHtml(html) => layout.push_words(&html),
                Event::SoftBreak | Event::HardBreak => layout.end_line(),
                Event::Rule => {
                    layout.end_line();
                    let rule = "─".repeat(layout.avail);
                    layout.push_raw(&rule);
                    layout.end_line();
                }
                _ => {}
            }
        }

        layout.finish(margin)
    }
}
