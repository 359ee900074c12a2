//! Writer loop for the unordered merge
//!
//! Runs on the calling thread and owns the receiving end of the hand-off
//! queue. Returning drops the receiver, which unblocks any worker waiting to
//! send.

use crossbeam_channel::{select, Receiver};
use std::io::Write;

use crate::destination::write_record;
use crate::error::{MergeError, Result};
use crate::platform::CancelSignal;

/// Write records as they arrive until the queue closes or the run is cancelled
///
/// Returns the number of records written. Records still queued when the
/// cancellation is observed are not written.
pub(crate) fn writer_loop<W: Write + ?Sized>(
    records: Receiver<Vec<u8>>,
    output: &mut W,
    target: &str,
    cancel: &CancelSignal,
) -> Result<u64> {
    let mut written = 0u64;

    loop {
        if cancel.is_cancelled() {
            tracing::debug!(written, pending = records.len(), "writer cancelled");
            return Ok(written);
        }

        select! {
            recv(cancel.watch()) -> _ => continue,
            recv(records) -> msg => match msg {
                Ok(record) => {
                    write_record(output, &record).map_err(|e| MergeError::destination(target, e))?;
                    written += 1;
                }
                Err(_) => {
                    tracing::debug!(written, "hand-off queue drained");
                    return Ok(written);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;
    use std::thread;

    #[test]
    fn test_writes_until_queue_closes() {
        let (tx, rx) = bounded(2);
        let producer = thread::spawn(move || {
            for line in ["a", "b", "c"] {
                tx.send(line.as_bytes().to_vec()).unwrap();
            }
        });

        let mut out = Vec::new();
        let written = writer_loop(rx, &mut out, "<stdout>", &CancelSignal::new()).unwrap();
        producer.join().unwrap();

        assert_eq!(written, 3);
        assert_eq!(out, b"a\nb\nc\n");
    }

    #[test]
    fn test_cancelled_writer_leaves_queue_unwritten() {
        let (tx, rx) = bounded(4);
        tx.send(b"queued".to_vec()).unwrap();
        let cancel = CancelSignal::new();
        cancel.cancel();

        let mut out = Vec::new();
        let written = writer_loop(rx, &mut out, "<stdout>", &cancel).unwrap();
        assert_eq!(written, 0);
        assert!(out.is_empty());
        assert!(tx.send(b"late".to_vec()).is_err());
    }
}
