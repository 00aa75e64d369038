//! Three-plane viewer orchestration.
//!
//! [`OrthoViewer`] owns the worker handle, issues requests on behalf of the
//! UI and routes responses to a [`SlicePresenter`]. It never touches voxel
//! data itself.

use glam::{DMat4, DVec3};

use crate::enums::AxisPlane;
use crate::error::SliceError;
use crate::resampler::OrientedSlice;
use crate::volume::AxisSlice;
use crate::volume_loader::VolumeHeader;
use crate::worker::{Request, RequestKind, Response, SlicerWorker};

/// Receives slice results for display.
pub trait SlicePresenter {
    fn initialized(&mut self, _dims: (usize, usize, usize), _header: &VolumeHeader) {}

    fn axis_slice(&mut self, slice: AxisSlice);

    /// `points` are the voxel-space points the slice was requested with.
    fn oriented_slice(&mut self, points: [DVec3; 3], slice: OrientedSlice);

    fn failed(&mut self, kind: RequestKind, error: SliceError) {
        log::error!("{kind:?} request failed: {error}");
    }
}

/// Oriented-slice request tracking.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RequestState {
    #[default]
    Idle,
    InFlight {
        seq: u64,
    },
}

#[derive(Clone, Debug)]
struct LoadedVolume {
    dims: (usize, usize, usize),
    header: VolumeHeader,
    world_to_voxel: DMat4,
}

pub struct OrthoViewer<P> {
    worker: SlicerWorker,
    presenter: P,
    volume: Option<LoadedVolume>,
    oriented: RequestState,
    next_seq: u64,
    pending: usize,
}

impl<P: SlicePresenter> OrthoViewer<P> {
    pub fn new(worker: SlicerWorker, presenter: P) -> Self {
        Self {
            worker,
            presenter,
            volume: None,
            oriented: RequestState::Idle,
            next_seq: 0,
            pending: 0,
        }
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    pub fn presenter_mut(&mut self) -> &mut P {
        &mut self.presenter
    }

    pub fn into_presenter(self) -> P {
        self.presenter
    }

    /// Volume dimensions, once the worker has reported them
    pub fn dims(&self) -> Option<(usize, usize, usize)> {
        self.volume.as_ref().map(|volume| volume.dims)
    }

    pub fn header(&self) -> Option<&VolumeHeader> {
        self.volume.as_ref().map(|volume| &volume.header)
    }

    pub fn oriented_state(&self) -> RequestState {
        self.oriented
    }

    /// Number of requests still waiting for a response
    pub fn pending(&self) -> usize {
        self.pending
    }

    fn send(&mut self, request: Request) -> bool {
        let sent = self.worker.send(request);
        if sent {
            self.pending += 1;
        } else {
            log::error!("slicer worker is gone");
        }
        sent
    }

    /// Hand the file contents to the worker for decoding.
    pub fn load(&mut self, bytes: Vec<u8>) -> bool {
        self.volume = None;
        self.send(Request::Init(bytes))
    }

    /// Request the slice at `index` on `plane`, clamped into the volume.
    pub fn slice(&mut self, plane: AxisPlane, index: usize) -> bool {
        let Some(dims) = self.dims() else {
            log::warn!("slice {plane}:{index} requested before the volume was loaded");
            return false;
        };
        let dim = [dims.0, dims.1, dims.2][plane.axis()];
        let index = index.min(dim.saturating_sub(1));
        self.send(Request::Slice { plane, index })
    }

    /// Request an oriented slice through three world-space points.
    ///
    /// Returns `false` without sending anything while a previous oriented
    /// request is still in flight.
    pub fn slice_plane(&mut self, points: [DVec3; 3], distance: f64) -> bool {
        let Some(volume) = &self.volume else {
            log::warn!("oriented slice requested before the volume was loaded");
            return false;
        };
        let to_voxel = volume.world_to_voxel;
        self.slice_plane_voxels(points.map(|p| to_voxel.transform_point3(p)), distance)
    }

    /// Same as [`slice_plane`](Self::slice_plane) with points already in
    /// voxel coordinates.
    pub fn slice_plane_voxels(&mut self, points: [DVec3; 3], distance: f64) -> bool {
        if let RequestState::InFlight { seq } = self.oriented {
            log::trace!("oriented slice suppressed, request {seq} in flight");
            return false;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        let sent = self.send(Request::SlicePlane {
            seq,
            points,
            distance,
        });
        if sent {
            self.oriented = RequestState::InFlight { seq };
        }
        sent
    }

    /// Wait for one response and route it. Returns `false` once the worker
    /// has stopped.
    pub async fn next(&mut self) -> bool {
        match self.worker.recv().await {
            Some(response) => {
                self.handle(response);
                true
            }
            None => false,
        }
    }

    /// Route responses until every request sent so far has been answered.
    pub async fn run_until_idle(&mut self) {
        while self.pending > 0 {
            if !self.next().await {
                break;
            }
        }
    }

    /// Blocking variant of [`run_until_idle`](Self::run_until_idle).
    pub fn blocking_run_until_idle(&mut self) {
        while self.pending > 0 {
            match self.worker.blocking_recv() {
                Some(response) => self.handle(response),
                None => break,
            }
        }
    }

    pub fn handle(&mut self, response: Response) {
        self.pending = self.pending.saturating_sub(1);
        match response {
            Response::Initialized { dims, header } => self.initialized(dims, header),
            Response::Sliced { plane, index, data } => {
                let Some(dims) = self.dims() else {
                    log::warn!("dropping {plane} slice received without a volume");
                    return;
                };
                let (cols, rows) = plane.raster_dim(dims);
                self.presenter.axis_slice(AxisSlice {
                    plane,
                    index,
                    cols,
                    rows,
                    data,
                });
            }
            Response::SlicedOriented { seq, points, slice } => {
                if self.finish_oriented(seq) {
                    self.presenter.oriented_slice(points, slice);
                }
            }
            Response::Failed { kind, seq, error } => {
                if let Some(seq) = seq {
                    if !self.finish_oriented(seq) {
                        return;
                    }
                }
                self.presenter.failed(kind, error);
            }
        }
    }

    /// Clear the in-flight marker if `seq` is the request being waited on.
    fn finish_oriented(&mut self, seq: u64) -> bool {
        match self.oriented {
            RequestState::InFlight { seq: current } if current == seq => {
                self.oriented = RequestState::Idle;
                true
            }
            _ => {
                log::debug!("dropping stale oriented slice {seq}");
                false
            }
        }
    }

    fn initialized(&mut self, dims: (usize, usize, usize), header: VolumeHeader) {
        let transform = header.display_transform();
        let world_to_voxel = if transform.determinant().abs() > f64::EPSILON {
            transform.inverse()
        } else {
            log::warn!("display transform is singular, using voxel coordinates");
            DMat4::IDENTITY
        };
        self.presenter.initialized(dims, &header);
        self.volume = Some(LoadedVolume {
            dims,
            header,
            world_to_voxel,
        });

        for plane in AxisPlane::ALL {
            let dim = [dims.0, dims.1, dims.2][plane.axis()];
            self.slice(plane, middle_index(dim));
        }
    }
}

/// `round((dim - 1) / 2)`
fn middle_index(dim: usize) -> usize {
    (dim.saturating_sub(1) as f64 / 2.0).round() as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::samples::ByteOrder;
    use crate::volume::tests::header;
    use crate::volume_loader::{RawVolume, VolumeDecoder, VolumeLoaderError};
    use crate::worker::SlicerService;

    struct FixedDecoder(VolumeHeader);

    impl VolumeDecoder for FixedDecoder {
        fn decode(&self, _bytes: &[u8]) -> Result<RawVolume, VolumeLoaderError> {
            let (nx, ny, nz) = self.0.dims;
            Ok(RawVolume {
                header: self.0.clone(),
                data: (0..nx * ny * nz).map(|i| i as u8).collect(),
                byte_order: ByteOrder::Little,
            })
        }
    }

    #[derive(Default)]
    struct Recorder {
        dims: Option<(usize, usize, usize)>,
        axis: Vec<AxisSlice>,
        oriented: Vec<OrientedSlice>,
        failures: Vec<RequestKind>,
    }

    impl SlicePresenter for Recorder {
        fn initialized(&mut self, dims: (usize, usize, usize), _header: &VolumeHeader) {
            self.dims = Some(dims);
        }

        fn axis_slice(&mut self, slice: AxisSlice) {
            self.axis.push(slice);
        }

        fn oriented_slice(&mut self, _points: [DVec3; 3], slice: OrientedSlice) {
            self.oriented.push(slice);
        }

        fn failed(&mut self, kind: RequestKind, _error: SliceError) {
            self.failures.push(kind);
        }
    }

    fn viewer(volume_header: VolumeHeader) -> OrthoViewer<Recorder> {
        let worker = SlicerWorker::spawn_with(SlicerService::new(FixedDecoder(volume_header)))
            .unwrap();
        OrthoViewer::new(worker, Recorder::default())
    }

    #[test]
    fn middle_index_rounds_half_up() {
        assert_eq!(middle_index(1), 0);
        assert_eq!(middle_index(4), 2);
        assert_eq!(middle_index(5), 2);
        assert_eq!(middle_index(0), 0);
    }

    #[test]
    fn load_requests_middle_slices() {
        let mut viewer = viewer(header((3, 4, 5), 2));
        assert!(viewer.load(Vec::new()));
        viewer.blocking_run_until_idle();

        let recorder = viewer.presenter();
        assert_eq!(recorder.dims, Some((3, 4, 5)));
        let requested: Vec<_> = recorder.axis.iter().map(|s| (s.plane, s.index)).collect();
        assert_eq!(
            requested,
            [(AxisPlane::Yz, 1), (AxisPlane::Xz, 2), (AxisPlane::Xy, 2)]
        );
        assert_eq!(recorder.axis[0].data.len(), 4 * 5);
    }

    #[test]
    fn slice_before_load_is_refused() {
        let mut viewer = viewer(header((3, 4, 5), 2));
        assert!(!viewer.slice(AxisPlane::Xy, 0));
        assert!(!viewer.slice_plane([DVec3::ZERO, DVec3::X, DVec3::Y], 0.0));
        assert_eq!(viewer.pending(), 0);
    }

    #[test]
    fn slice_index_is_clamped() {
        let mut viewer = viewer(header((3, 4, 5), 2));
        viewer.load(Vec::new());
        viewer.blocking_run_until_idle();
        assert!(viewer.slice(AxisPlane::Xy, 99));
        viewer.blocking_run_until_idle();
        assert_eq!(viewer.presenter().axis.last().map(|s| s.index), Some(4));
    }

    #[test]
    fn oriented_requests_are_debounced() {
        let mut viewer = viewer(header((4, 4, 4), 2));
        viewer.load(Vec::new());
        viewer.blocking_run_until_idle();

        let points = [DVec3::new(0.0, 0.0, 1.0), DVec3::new(1.0, 0.0, 1.0), DVec3::new(0.0, 1.0, 1.0)];
        assert!(viewer.slice_plane(points, 0.0));
        assert_eq!(viewer.oriented_state(), RequestState::InFlight { seq: 0 });
        assert!(!viewer.slice_plane(points, 1.0));
        assert!(!viewer.slice_plane(points, 2.0));

        viewer.blocking_run_until_idle();
        assert_eq!(viewer.oriented_state(), RequestState::Idle);
        assert_eq!(viewer.presenter().oriented.len(), 1);

        assert!(viewer.slice_plane(points, 0.5));
        assert_eq!(viewer.oriented_state(), RequestState::InFlight { seq: 1 });
        viewer.blocking_run_until_idle();
        assert_eq!(viewer.presenter().oriented.len(), 2);
    }

    #[test]
    fn degenerate_plane_failure_clears_in_flight() {
        let mut viewer = viewer(header((4, 4, 4), 2));
        viewer.load(Vec::new());
        viewer.blocking_run_until_idle();

        assert!(viewer.slice_plane([DVec3::ZERO, DVec3::ONE, DVec3::splat(2.0)], 0.0));
        viewer.blocking_run_until_idle();
        assert_eq!(viewer.oriented_state(), RequestState::Idle);
        assert_eq!(viewer.presenter().failures, [RequestKind::SlicePlane]);
    }

    #[test]
    fn stale_oriented_response_is_dropped() {
        let mut viewer = viewer(header((4, 4, 4), 2));
        viewer.handle(Response::SlicedOriented {
            seq: 42,
            points: [DVec3::ZERO, DVec3::X, DVec3::Y],
            slice: OrientedSlice::empty(4),
        });
        assert!(viewer.presenter().oriented.is_empty());
    }

    #[test]
    fn world_points_are_mapped_to_voxels() {
        let mut volume_header = header((4, 4, 4), 2);
        volume_header.pixel_dims = [1.0, 2.0, 2.0, 2.0, 1.0, 1.0, 1.0, 1.0];
        let mut viewer = viewer(volume_header);
        viewer.load(Vec::new());
        viewer.blocking_run_until_idle();

        // world z = 4 is voxel z = 2
        let world = [DVec3::new(0.0, 0.0, 4.0), DVec3::new(2.0, 0.0, 4.0), DVec3::new(0.0, 2.0, 4.0)];
        assert!(viewer.slice_plane(world, 0.0));
        viewer.blocking_run_until_idle();
        let slice = &viewer.presenter().oriented[0];
        assert!(slice.vertices.iter().all(|v| (v[2] - 2.0).abs() < 1e-12));
    }
}
