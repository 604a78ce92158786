/// Small status screen, e.g. an SSD1306 on the tracker board
pub trait StatusDisplay {
    fn clear(&mut self);
    fn draw_str(&mut self, x: u8, y: u8, text: &str);
    fn send(&mut self);

    /// Replaces the whole screen with one line of text
    fn show_line(&mut self, text: &str) {
        self.clear();
        self.draw_str(0, 12, text);
        self.send();
    }
}

/// For boards without a screen
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDisplay;

impl StatusDisplay for NoDisplay {
    fn clear(&mut self) {}
    fn draw_str(&mut self, _x: u8, _y: u8, _text: &str) {}
    fn send(&mut self) {}
}
