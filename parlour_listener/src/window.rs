/// The client's terminal dimensions, in character cells
#[derive(Debug,Clone,Copy,PartialEq,Eq)]
pub struct WindowSize
{
    pub width: usize,
    pub height: usize,
}

impl Default for WindowSize
{
    fn default() -> Self
    {
        Self { width: 80, height: 24 }
    }
}

impl WindowSize
{
    /// Parse an xterm window size report, `ESC [ 8 ; rows ; cols t`.
    ///
    /// Clients send this in-band, on a line of its own, whenever their window
    /// changes size. Zero dimensions are rejected.
    pub fn parse_report(line: &str) -> Option<Self>
    {
        let body = line.trim().strip_prefix("\x1b[8;")?.strip_suffix('t')?;
        let (rows, cols) = body.split_once(';')?;
        let height: usize = rows.parse().ok()?;
        let width: usize = cols.parse().ok()?;

        if width == 0 || height == 0
        {
            return None;
        }
        Some(Self { width, height })
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn parses_resize_report()
    {
        assert_eq!(WindowSize::parse_report("\x1b[8;40;120t"), Some(WindowSize { width: 120, height: 40 }));
        assert_eq!(WindowSize::parse_report("\x1b[8;40;120t\r"), Some(WindowSize { width: 120, height: 40 }));
    }

    #[test]
    fn rejects_other_lines()
    {
        assert_eq!(WindowSize::parse_report("hello"), None);
        assert_eq!(WindowSize::parse_report("\x1b[8;0;120t"), None);
        assert_eq!(WindowSize::parse_report("\x1b[8;40t"), None);
    }
}
