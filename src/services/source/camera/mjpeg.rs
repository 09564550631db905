const SOI: [u8; 2] = [0xFF, 0xD8];
const EOI: [u8; 2] = [0xFF, 0xD9];

// A single frame never gets this big; drop the buffer if the stream is garbage.
const MAX_BUFFER: usize = 32 * 1024 * 1024;

/// Splits a raw MJPEG byte stream into complete JPEG frames.
#[derive(Debug, Default)]
pub struct MjpegSplitter {
    buf: Vec<u8>,
}

impl MjpegSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes, get back every frame completed by them.
    pub fn push(&mut self, data: &[u8]) -> Vec<Vec<u8>> {
        self.buf.extend_from_slice(data);
        let mut frames = Vec::new();

        loop {
            let Some(start) = find(&self.buf, &SOI, 0) else {
                // Keep a trailing 0xFF: it may be the first half of a marker.
                let keep = usize::from(self.buf.last() == Some(&0xFF));
                let len = self.buf.len();
                self.buf.drain(..len - keep);
                break;
            };

            match find(&self.buf, &EOI, start + SOI.len()) {
                Some(end) => {
                    let end = end + EOI.len();
                    frames.push(self.buf[start..end].to_vec());
                    self.buf.drain(..end);
                }
                None => {
                    self.buf.drain(..start);
                    break;
                }
            }
        }

        if self.buf.len() > MAX_BUFFER {
            log::warn!("MJPEG buffer overflow, discarding {} bytes", self.buf.len());
            self.buf.clear();
        }

        frames
    }

    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from >= haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}
