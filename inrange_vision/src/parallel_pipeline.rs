// THEORY:
// The `parallel_pipeline` module serves hosts that want to push frames through the
// detector from async code, or to analyze several frames at once. Detection has
// no memory between frames, so frames can be handed to any worker in any order;
// the only state the workers share is the detector's immutable configuration.
//
// Key architectural principles:
// 1.  **Shared Read-Only Detector**: Every worker holds an `Arc<ColorDetector>`.
//     Nothing in it is written after construction, so no lock is taken per frame.
// 2.  **Independent Buffers**: Each frame is copied into its own buffer before it
//     is dispatched, and each worker allocates its own conversion and mask buffers.
//     Frames processed at the same time never touch the same memory.
// 3.  **Buffer Pool**: Frame copies are drawn from and returned to a small pool so
//     steady-state processing does not allocate a frame-sized buffer per frame.
// 4.  **Round-Robin Dispatch**: A single dispatcher task spreads frames across the
//     workers. Results come back on a per-frame oneshot channel, so callers always
//     receive the result for the frame they submitted.
// 5.  **Blocking Analysis**: Detection is pure CPU work. Workers hand each frame to
//     `spawn_blocking` so the async executor threads stay free for I/O.

use crate::core_modules::detector::ColorDetector;
use crate::core_modules::frame::{Frame, FrameGeometry, OwnedFrame};
use crate::core_modules::smart_blob::Detection;
use crate::core_modules::utils::image_helper::image_helper::render_debug_mask;
use crate::error::StageError;
use futures::future::join_all;
use image::GrayImage;
use log::{debug, warn};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{mpsc, oneshot};

const FRAME_POOL_SIZE: usize = 8;

type BufferPool = Arc<Mutex<VecDeque<Vec<u8>>>>;

fn lock_pool(pool: &BufferPool) -> MutexGuard<'_, VecDeque<Vec<u8>>> {
    // The pool only holds spare buffers; a poisoned lock leaves it usable.
    pool.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn recycle_buffer(pool: &BufferPool, buffer: Vec<u8>) {
    let mut pool = lock_pool(pool);
    if pool.len() < FRAME_POOL_SIZE {
        pool.push_back(buffer);
    }
}

/// The detector's answer for one submitted frame.
#[derive(Debug, Clone)]
pub struct FrameResult {
    /// Submission order, starting at 0.
    pub frame_id: u64,
    pub detection: Detection,
    pub component_count: usize,
    pub debug_mask: Option<GrayImage>,
}

struct FrameTask {
    frame_id: u64,
    frame: OwnedFrame,
    result_sender: oneshot::Sender<FrameResult>,
}

struct WorkerPool {
    task_sender: mpsc::UnboundedSender<FrameTask>,
    workers: Vec<tokio::task::JoinHandle<()>>,
}

impl WorkerPool {
    fn new(detector: Arc<ColorDetector>, worker_count: usize, with_masks: bool, buffer_pool: BufferPool) -> Self {
        let (task_sender, mut task_receiver) = mpsc::unbounded_channel::<FrameTask>();
        let mut workers = Vec::with_capacity(worker_count + 1);

        let (worker_senders, worker_receivers): (Vec<_>, Vec<_>) = (0..worker_count)
            .map(|_| mpsc::unbounded_channel::<FrameTask>())
            .unzip();

        // Spawn dispatcher
        workers.push(tokio::spawn(async move {
            let mut worker_idx = 0;
            while let Some(task) = task_receiver.recv().await {
                let _ = worker_senders[worker_idx].send(task);
                worker_idx = (worker_idx + 1) % worker_senders.len();
            }
        }));

        // Spawn workers
        for mut worker_receiver in worker_receivers {
            let detector = Arc::clone(&detector);
            let buffer_pool = Arc::clone(&buffer_pool);

            workers.push(tokio::spawn(async move {
                while let Some(task) = worker_receiver.recv().await {
                    let FrameTask {
                        frame_id,
                        frame,
                        result_sender,
                    } = task;
                    let detector = Arc::clone(&detector);
                    let analyzed = tokio::task::spawn_blocking(move || {
                        let analysis = detector.analyze(&frame.as_frame());
                        let result = FrameResult {
                            frame_id,
                            detection: analysis.detection,
                            component_count: analysis.component_count,
                            debug_mask: with_masks.then(|| render_debug_mask(&analysis.mask)),
                        };
                        (result, frame)
                    })
                    .await;

                    // A panicked analysis drops the sender; the caller sees a receive error.
                    let Ok((result, frame)) = analyzed else {
                        warn!("analysis of frame {frame_id} did not complete");
                        continue;
                    };
                    recycle_buffer(&buffer_pool, frame.data);

                    let _ = result_sender.send(result);
                }
            }));
        }

        Self { task_sender, workers }
    }
}

/// Runs the color detector on a pool of tokio tasks.
///
/// Must be created from within a tokio runtime.
pub struct ParallelDetector {
    worker_pool: WorkerPool,
    frame_buffer_pool: BufferPool,
    frame_counter: AtomicU64,
}

impl ParallelDetector {
    /// One worker per logical CPU.
    pub fn new(detector: ColorDetector, with_masks: bool) -> Self {
        Self::with_workers(detector, num_cpus::get(), with_masks)
    }

    pub fn with_workers(detector: ColorDetector, worker_count: usize, with_masks: bool) -> Self {
        let worker_count = worker_count.max(1);
        let frame_buffer_pool: BufferPool = Arc::new(Mutex::new(VecDeque::with_capacity(FRAME_POOL_SIZE)));
        let worker_pool = WorkerPool::new(
            Arc::new(detector),
            worker_count,
            with_masks,
            Arc::clone(&frame_buffer_pool),
        );
        debug!("parallel detector started with {} worker(s)", worker_count);

        Self {
            worker_pool,
            frame_buffer_pool,
            frame_counter: AtomicU64::new(0),
        }
    }

    pub fn worker_count(&self) -> usize {
        self.worker_pool.workers.len() - 1
    }

    /// Copies `data` into a pooled buffer and runs detection on it.
    pub async fn process_frame(&self, data: &[u8], geometry: FrameGeometry) -> Result<FrameResult, StageError> {
        let frame = self.get_frame_buffer(data, geometry)?;
        let frame_id = self.frame_counter.fetch_add(1, Ordering::Relaxed);
        let (result_sender, result_receiver) = oneshot::channel();

        self.worker_pool
            .task_sender
            .send(FrameTask {
                frame_id,
                frame,
                result_sender,
            })
            .map_err(|_| StageError::WorkerPool("failed to send task to worker pool"))?;

        result_receiver
            .await
            .map_err(|_| StageError::WorkerPool("failed to receive result from worker"))
    }

    /// Processes several frames concurrently. Results are in input order.
    pub async fn process_batch(&self, frames: &[&[u8]], geometry: FrameGeometry) -> Vec<Result<FrameResult, StageError>> {
        join_all(frames.iter().map(|data| self.process_frame(data, geometry))).await
    }

    fn get_frame_buffer(&self, data: &[u8], geometry: FrameGeometry) -> Result<OwnedFrame, StageError> {
        // Validated before a pooled buffer is taken.
        Frame::new(geometry, data)?;
        let mut buffer = lock_pool(&self.frame_buffer_pool).pop_front().unwrap_or_default();

        buffer.clear();
        buffer.extend_from_slice(data);

        Ok(OwnedFrame { geometry, data: buffer })
    }

    /// Number of spare buffers currently pooled.
    pub fn pooled_buffers(&self) -> usize {
        lock_pool(&self.frame_buffer_pool).len()
    }

    /// Stops accepting frames and waits for in-flight work to finish.
    pub async fn shutdown(self) {
        let WorkerPool { task_sender, workers } = self.worker_pool;
        drop(task_sender);
        for worker in workers {
            let _ = worker.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::color_model::TargetColor;
    use crate::core_modules::frame::YuvMatrix;
    use crate::core_modules::smart_blob::BoundingBox;
    use image::{Rgb, RgbImage};

    fn frame_with_square(left: u32, top: u32, side: u32) -> OwnedFrame {
        let mut rgb = RgbImage::from_pixel(48, 48, Rgb([128, 128, 128]));
        for y in top..top + side {
            for x in left..left + side {
                rgb.put_pixel(x, y, Rgb([255, 0, 0]));
            }
        }
        OwnedFrame::from_rgb(&rgb, 48).unwrap()
    }

    fn detector() -> ColorDetector {
        ColorDetector::new(TargetColor::default(), YuvMatrix::Jpeg)
    }

    #[tokio::test]
    async fn single_frame_round_trip() {
        let parallel = ParallelDetector::with_workers(detector(), 2, true);
        let frame = frame_with_square(10, 10, 12);

        let result = parallel.process_frame(&frame.data, frame.geometry).await.unwrap();
        assert_eq!(result.frame_id, 0);
        assert_eq!(result.detection, Some(BoundingBox::new(10, 10, 12, 12)));
        assert_eq!(result.debug_mask.map(|m| m.dimensions()), Some((12, 12)));
        assert_eq!(parallel.pooled_buffers(), 1);
        parallel.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn batch_results_keep_input_order() {
        let parallel = ParallelDetector::with_workers(detector(), 3, false);
        let frames: Vec<OwnedFrame> = (0..6).map(|i| frame_with_square(2 + i * 4, 8, 10)).collect();
        let views: Vec<&[u8]> = frames.iter().map(|f| f.data.as_slice()).collect();

        let results = parallel.process_batch(&views, frames[0].geometry).await;
        for (i, result) in results.into_iter().enumerate() {
            let result = result.unwrap();
            assert_eq!(result.detection, Some(BoundingBox::new(2 + i as u32 * 4, 8, 10, 10)));
            assert!(result.debug_mask.is_none());
        }
        assert_eq!(parallel.worker_count(), 3);
        parallel.shutdown().await;
    }

    #[tokio::test]
    async fn short_buffer_is_rejected_before_dispatch() {
        let parallel = ParallelDetector::with_workers(detector(), 1, false);
        let geometry = FrameGeometry::packed(48, 48).unwrap();
        let result = parallel.process_frame(&[0u8; 16], geometry).await;
        assert!(matches!(result, Err(StageError::Frame(_))));
        parallel.shutdown().await;
    }

    #[tokio::test]
    async fn rejected_frame_keeps_pooled_buffer() {
        let parallel = ParallelDetector::with_workers(detector(), 1, false);
        let frame = frame_with_square(4, 4, 10);
        parallel.process_frame(&frame.data, frame.geometry).await.unwrap();
        assert_eq!(parallel.pooled_buffers(), 1);

        let result = parallel.process_frame(&frame.data[..32], frame.geometry).await;
        assert!(matches!(result, Err(StageError::Frame(_))));
        assert_eq!(parallel.pooled_buffers(), 1);

        // The surviving buffer is reused for the next good frame.
        let result = parallel.process_frame(&frame.data, frame.geometry).await.unwrap();
        assert_eq!(result.frame_id, 1);
        assert_eq!(result.detection, Some(BoundingBox::new(4, 4, 10, 10)));
        assert_eq!(parallel.pooled_buffers(), 1);
        parallel.shutdown().await;
    }

    #[tokio::test(flavor = "current_thread")]
    async fn batch_completes_on_single_threaded_runtime() {
        let parallel = ParallelDetector::with_workers(detector(), 2, false);
        let frames: Vec<OwnedFrame> = (0..4).map(|i| frame_with_square(i * 6, 20, 8)).collect();
        let views: Vec<&[u8]> = frames.iter().map(|f| f.data.as_slice()).collect();

        let results = parallel.process_batch(&views, frames[0].geometry).await;
        for (i, result) in results.into_iter().enumerate() {
            assert_eq!(result.unwrap().detection, Some(BoundingBox::new(i as u32 * 6, 20, 8, 8)));
        }
        parallel.shutdown().await;
    }
}
