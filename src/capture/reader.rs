use anyhow::{anyhow, bail, Context, Result};
use crossbeam_channel::Sender;
use pcap::{Capture, Offline};
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

use crate::types::ReaderStats;
use super::decoder::{decode_frame, LinkKind};
use super::packet::PacketInfo;

/// Replays a capture file on its own thread, pushing decoded packets to the
/// engine in file order.
pub struct PcapReader {
    path: PathBuf,
    link: LinkKind,
    capture: Option<Capture<Offline>>,          // owned until start, then moved into thread
    reader_thread: Option<JoinHandle<ReaderStats>>,
}

impl PcapReader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let capture = Capture::from_file(&path)
            .with_context(|| format!("open capture {}", path.display()))?;

        let datalink = capture.get_datalink();
        let link = LinkKind::from_linktype(datalink.0)
            .with_context(|| format!("capture {}", path.display()))?;

        info!(path = %path.display(), ?link, "capture opened");
        Ok(Self { path, link, capture: Some(capture), reader_thread: None })
    }

    pub fn start(&mut self, sender: Sender<PacketInfo>) -> Result<()> {
        let Some(mut cap) = self.capture.take() else {
            bail!("reader for {} was already started", self.path.display());
        };
        let link = self.link;

        let handle = thread::Builder::new()
            .name("pcap-reader".into())
            .spawn(move || {
                let mut stats = ReaderStats::default();
                loop {
                    match cap.next_packet() {
                        Ok(packet) => {
                            stats.frames += 1;
                            let ts = packet.header.ts;
                            let Some(timestamp) = timestamp_us(ts.tv_sec as i64, ts.tv_usec as i64) else {
                                stats.skipped += 1;
                                debug!(frame = stats.frames, sec = ts.tv_sec as i64, "skipping frame with negative timestamp");
                                continue;
                            };
                            match decode_frame(timestamp, link, packet.data) {
                                Ok(pkt) => {
                                    stats.decoded += 1;
                                    // Engine gone, nobody left to feed
                                    if sender.send(pkt).is_err() { break; }
                                }
                                Err(e) => {
                                    stats.skipped += 1;
                                    debug!(frame = stats.frames, error = %e, "skipping frame");
                                }
                            }
                        }
                        Err(pcap::Error::NoMorePackets) => break,
                        Err(e) => {
                            warn!(error = %e, "capture read failed, treating as end of input");
                            break;
                        }
                    }
                }
                debug!(frames = stats.frames, skipped = stats.skipped, "reader thread exiting");
                stats
                // sender drops here, which ends the engine's input
            })?;

        self.reader_thread = Some(handle);
        Ok(())
    }

    pub fn join(&mut self) -> Result<ReaderStats> {
        let handle = self
            .reader_thread
            .take()
            .ok_or_else(|| anyhow!("reader isn't running"))?;
        handle.join().map_err(|_| anyhow!("reader thread panicked"))
    }
}

/// Capture time in microseconds, `None` for a timestamp before the epoch or
/// one that doesn't fit.
fn timestamp_us(sec: i64, usec: i64) -> Option<u64> {
    let sec = u64::try_from(sec).ok()?;
    let usec = u64::try_from(usec).ok()?;
    sec.checked_mul(1_000_000)?.checked_add(usec)
}
