//! Message protocol between the viewer and the slicing worker.
//!
//! ```text
//! VIEWER                                              WORKER
//!   ----------------- Init(bytes) ----------------->  decode + normalize
//!   <-------- Initialized(dims, header) ------------
//!   ------------- Slice(plane, index) ------------->  Volume::slice
//!   <------- Sliced(plane, index, bytes) -----------
//!   ------- SlicePlane(seq, points, distance) ----->  Volume::slice_oriented
//!   <------ SlicedOriented(seq, points, slice) -----
//! ```
//!
//! Buffers are moved through the channels; neither side keeps a handle to
//! data it has sent.

use std::thread::{self, JoinHandle};

use glam::DVec3;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use web_time::Instant;

use crate::enums::AxisPlane;
use crate::error::SliceError;
use crate::resampler::OrientedSlice;
use crate::volume::Volume;
use crate::volume_loader::{NiftiDecoder, VolumeDecoder, VolumeHeader, VolumeLoader};

#[derive(Debug)]
pub enum Request {
    /// Raw file bytes to decode into the worker's volume
    Init(Vec<u8>),
    Slice {
        plane: AxisPlane,
        index: usize,
    },
    /// Oriented slice through three voxel-space points
    SlicePlane {
        seq: u64,
        points: [DVec3; 3],
        distance: f64,
    },
}

impl Request {
    pub fn kind(&self) -> RequestKind {
        match self {
            Request::Init(_) => RequestKind::Init,
            Request::Slice { .. } => RequestKind::Slice,
            Request::SlicePlane { .. } => RequestKind::SlicePlane,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestKind {
    Init,
    Slice,
    SlicePlane,
}

#[derive(Debug)]
pub enum Response {
    Initialized {
        dims: (usize, usize, usize),
        header: VolumeHeader,
    },
    Sliced {
        plane: AxisPlane,
        index: usize,
        data: Vec<u8>,
    },
    SlicedOriented {
        seq: u64,
        points: [DVec3; 3],
        slice: OrientedSlice,
    },
    /// The request failed; any previously loaded volume is untouched.
    Failed {
        kind: RequestKind,
        seq: Option<u64>,
        error: SliceError,
    },
}

/// Request handler owning the volume. Runs on the worker thread.
pub struct SlicerService<D = NiftiDecoder> {
    decoder: D,
    volume: Option<Volume>,
}

impl Default for SlicerService {
    fn default() -> Self {
        Self::new(NiftiDecoder)
    }
}

impl<D: VolumeDecoder> SlicerService<D> {
    pub fn new(decoder: D) -> Self {
        Self {
            decoder,
            volume: None,
        }
    }

    pub fn volume(&self) -> Option<&Volume> {
        self.volume.as_ref()
    }

    pub fn handle(&mut self, request: Request) -> Response {
        let kind = request.kind();
        let started = Instant::now();
        let response = match request {
            Request::Init(bytes) => self.init(&bytes),
            Request::Slice { plane, index } => self.slice(plane, index),
            Request::SlicePlane {
                seq,
                points,
                distance,
            } => self.slice_plane(seq, points, distance),
        };
        log::debug!("{kind:?} handled in {:?}", started.elapsed());
        response
    }

    fn init(&mut self, bytes: &[u8]) -> Response {
        match VolumeLoader::load_with(&self.decoder, bytes) {
            Ok(volume) => {
                let response = Response::Initialized {
                    dims: volume.dim(),
                    header: volume.header().clone(),
                };
                self.volume = Some(volume);
                response
            }
            Err(error) => Response::Failed {
                kind: RequestKind::Init,
                seq: None,
                error: error.into(),
            },
        }
    }

    fn slice(&self, plane: AxisPlane, index: usize) -> Response {
        let Some(volume) = &self.volume else {
            return Response::Failed {
                kind: RequestKind::Slice,
                seq: None,
                error: SliceError::NotInitialized,
            };
        };
        let (nx, ny, nz) = volume.dim();
        let dim = [nx, ny, nz][plane.axis()];
        if index >= dim {
            // Volume::slice panics past the end of the axis
            return Response::Failed {
                kind: RequestKind::Slice,
                seq: None,
                error: SliceError::IndexOutOfRange { plane, index, dim },
            };
        }
        let slice = volume.slice(plane, index);
        Response::Sliced {
            plane,
            index,
            data: slice.data,
        }
    }

    fn slice_plane(&self, seq: u64, points: [DVec3; 3], distance: f64) -> Response {
        let result = self
            .volume
            .as_ref()
            .ok_or(SliceError::NotInitialized)
            .and_then(|volume| volume.slice_oriented(points, distance));
        match result {
            Ok(slice) => Response::SlicedOriented { seq, points, slice },
            Err(error) => {
                log::warn!("oriented slice {seq} failed: {error}");
                Response::Failed {
                    kind: RequestKind::SlicePlane,
                    seq: Some(seq),
                    error,
                }
            }
        }
    }
}

/// Handle to a slicing worker running on its own thread.
///
/// Requests are handled one at a time, so responses come back in request
/// order. Dropping the handle closes the request channel and lets the
/// thread exit.
pub struct SlicerWorker {
    requests: UnboundedSender<Request>,
    responses: UnboundedReceiver<Response>,
    thread: Option<JoinHandle<()>>,
}

impl SlicerWorker {
    pub fn spawn() -> std::io::Result<Self> {
        Self::spawn_with(SlicerService::<NiftiDecoder>::default())
    }

    pub fn spawn_with<D>(mut service: SlicerService<D>) -> std::io::Result<Self>
    where
        D: VolumeDecoder + Send + 'static,
    {
        let (request_tx, mut request_rx) = mpsc::unbounded_channel::<Request>();
        let (response_tx, response_rx) = mpsc::unbounded_channel::<Response>();

        let thread = thread::Builder::new()
            .name("slicer-worker".into())
            .spawn(move || {
                while let Some(request) = request_rx.blocking_recv() {
                    if response_tx.send(service.handle(request)).is_err() {
                        break;
                    }
                }
                log::debug!("slicer worker stopped");
            })?;

        Ok(Self {
            requests: request_tx,
            responses: response_rx,
            thread: Some(thread),
        })
    }

    /// Queue a request. Returns `false` if the worker has stopped.
    pub fn send(&self, request: Request) -> bool {
        self.requests.send(request).is_ok()
    }

    /// Next response, or `None` once the worker has stopped.
    pub async fn recv(&mut self) -> Option<Response> {
        self.responses.recv().await
    }

    /// Blocking variant of [`recv`](Self::recv) for callers outside a runtime.
    pub fn blocking_recv(&mut self) -> Option<Response> {
        self.responses.blocking_recv()
    }

    /// Close the request channel and wait for the thread to finish.
    pub fn shutdown(mut self) {
        self.join();
    }

    fn join(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        // close the channel so the worker loop ends
        let (closed, _) = mpsc::unbounded_channel();
        self.requests = closed;
        if thread.join().is_err() {
            log::error!("slicer worker panicked");
        }
    }
}

impl Drop for SlicerWorker {
    fn drop(&mut self) {
        self.join();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::samples::ByteOrder;
    use crate::volume::tests::header;
    use crate::volume_loader::{RawVolume, VolumeLoaderError};

    /// Ignores the input bytes and hands out a fixed uint8 volume.
    struct FixedDecoder(RawVolume);

    impl VolumeDecoder for FixedDecoder {
        fn decode(&self, _bytes: &[u8]) -> Result<RawVolume, VolumeLoaderError> {
            Ok(self.0.clone())
        }
    }

    fn service() -> SlicerService<FixedDecoder> {
        SlicerService::new(FixedDecoder(RawVolume {
            header: header((3, 4, 5), 2),
            data: (0..60).collect(),
            byte_order: ByteOrder::Little,
        }))
    }

    #[test]
    fn slice_before_init_fails() {
        let mut service = service();
        let response = service.handle(Request::Slice {
            plane: AxisPlane::Xy,
            index: 0,
        });
        assert!(matches!(
            response,
            Response::Failed {
                kind: RequestKind::Slice,
                error: SliceError::NotInitialized,
                ..
            }
        ));
    }

    #[test]
    fn init_reports_dims() {
        let mut service = service();
        match service.handle(Request::Init(Vec::new())) {
            Response::Initialized { dims, header } => {
                assert_eq!(dims, (3, 4, 5));
                assert_eq!(header.datatype_code, 2);
            }
            other => panic!("unexpected response {other:?}"),
        }
        assert!(service.volume().is_some());
    }

    #[test]
    fn degenerate_plane_keeps_volume_usable() {
        let mut service = service();
        service.handle(Request::Init(Vec::new()));
        let response = service.handle(Request::SlicePlane {
            seq: 7,
            points: [DVec3::ZERO, DVec3::ONE, DVec3::splat(2.0)],
            distance: 0.0,
        });
        assert!(matches!(
            response,
            Response::Failed {
                kind: RequestKind::SlicePlane,
                seq: Some(7),
                error: SliceError::DegeneratePlane,
            }
        ));
        let response = service.handle(Request::Slice {
            plane: AxisPlane::Yz,
            index: 1,
        });
        assert!(matches!(response, Response::Sliced { index: 1, .. }));
    }

    #[test]
    fn out_of_range_index_is_reported() {
        let mut service = service();
        service.handle(Request::Init(Vec::new()));
        let response = service.handle(Request::Slice {
            plane: AxisPlane::Xy,
            index: 5,
        });
        assert!(matches!(
            response,
            Response::Failed {
                error: SliceError::IndexOutOfRange { dim: 5, .. },
                ..
            }
        ));
    }

    #[test]
    fn failed_init_is_reported() {
        let mut service: SlicerService = SlicerService::default();
        let response = service.handle(Request::Init(b"not a volume".to_vec()));
        assert!(matches!(
            response,
            Response::Failed {
                kind: RequestKind::Init,
                error: SliceError::Load(VolumeLoaderError::NotAVolume),
                ..
            }
        ));
        assert!(service.volume().is_none());
    }

    #[test]
    fn worker_answers_in_request_order() {
        let mut worker = SlicerWorker::spawn_with(service()).unwrap();
        assert!(worker.send(Request::Init(Vec::new())));
        for index in 0..3 {
            assert!(worker.send(Request::Slice {
                plane: AxisPlane::Yz,
                index,
            }));
        }
        assert!(matches!(
            worker.blocking_recv(),
            Some(Response::Initialized { .. })
        ));
        for expected in 0..3 {
            match worker.blocking_recv() {
                Some(Response::Sliced { index, data, .. }) => {
                    assert_eq!(index, expected);
                    assert_eq!(data.len(), 4 * 5);
                }
                other => panic!("unexpected response {other:?}"),
            }
        }
        worker.shutdown();
    }
}
