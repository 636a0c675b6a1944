use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::io::dataset_io::{read_dataset, write_dataset, DatasetError};
use crate::io::lock::{FileLock, LockError};
use crate::model::{Dataset, Order, OrderId, Route, RouteId};
use crate::sync::{server, ApiError, Backend, PatchRequest, Partial};

/// Backend over the project's dataset file.
///
/// Every call takes the board lock, reads the file, applies the change
/// and writes it back atomically, so the TUI and the CLI can share one
/// dataset.
#[derive(Debug, Clone)]
pub struct FileBackend {
    board_dir: PathBuf,
    dataset_path: PathBuf,
}

impl FileBackend {
    pub fn new(board_dir: &Path, dataset_path: &Path) -> Self {
        FileBackend {
            board_dir: board_dir.to_path_buf(),
            dataset_path: dataset_path.to_path_buf(),
        }
    }

    pub fn dataset_path(&self) -> &Path {
        &self.dataset_path
    }

    fn lock(&self) -> Result<FileLock, ApiError> {
        FileLock::acquire_default(&self.board_dir).map_err(lock_error)
    }

    fn load(&self) -> Result<Dataset, ApiError> {
        if !self.dataset_path.exists() {
            return Ok(Dataset::default());
        }
        read_dataset(&self.dataset_path).map_err(dataset_error)
    }

    /// Run `apply` against the dataset under the lock and persist the
    /// result when it succeeds.
    fn mutate<R>(
        &mut self,
        apply: impl FnOnce(&mut Dataset) -> Result<R, ApiError>,
    ) -> Result<R, ApiError> {
        let _lock = self.lock()?;
        let mut dataset = self.load()?;
        let result = apply(&mut dataset)?;
        write_dataset(&self.dataset_path, &dataset).map_err(dataset_error)?;
        debug!(path = %self.dataset_path.display(), "dataset written");
        Ok(result)
    }
}

fn lock_error(e: LockError) -> ApiError {
    warn!(error = %e, "dataset lock unavailable");
    ApiError::unavailable(e.to_string())
}

fn dataset_error(e: DatasetError) -> ApiError {
    warn!(error = %e, "dataset file error");
    ApiError::new(500, e.to_string())
}

impl Backend for FileBackend {
    fn fetch_dataset(&mut self) -> Result<Dataset, ApiError> {
        let _lock = self.lock()?;
        self.load()
    }

    fn create_route(&mut self, route: &Route) -> Result<Route, ApiError> {
        self.mutate(|ds| server::create_route(ds, route))
    }

    fn update_route(&mut self, patch: &PatchRequest) -> Result<Option<Partial>, ApiError> {
        self.mutate(|ds| server::update_route(ds, patch)).map(Some)
    }

    fn delete_route(&mut self, id: RouteId) -> Result<(), ApiError> {
        self.mutate(|ds| server::delete_route(ds, id))
    }

    fn create_order(&mut self, order: &Order) -> Result<Order, ApiError> {
        self.mutate(|ds| server::create_order(ds, order))
    }

    fn update_order(&mut self, patch: &PatchRequest) -> Result<Option<Partial>, ApiError> {
        self.mutate(|ds| server::update_order(ds, patch)).map(Some)
    }

    fn delete_order(&mut self, id: OrderId) -> Result<(), ApiError> {
        self.mutate(|ds| server::delete_order(ds, id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn setup() -> (TempDir, FileBackend) {
        let tmp = TempDir::new().unwrap();
        let board_dir = tmp.path().join("routeboard");
        fs::create_dir_all(&board_dir).unwrap();
        let mut route = Route::new(1, "North");
        route.delivery_orders.push(Order::new(10, 1, "Acme"));
        route.delivery_orders.push(Order::new(11, 1, "Birch"));
        crate::ops::arrangement::normalize_route(&mut route);
        let path = board_dir.join("dataset.json");
        write_dataset(
            &path,
            &Dataset {
                routes: vec![route, Route::new(2, "South")],
                ..Default::default()
            },
        )
        .unwrap();
        let backend = FileBackend::new(&board_dir, &path);
        (tmp, backend)
    }

    #[test]
    fn update_persists_to_disk() {
        let (_tmp, mut backend) = setup();
        backend
            .send_patch(&PatchRequest::order(11).with("route_id", 2i64))
            .unwrap();
        let ds = read_dataset(backend.dataset_path()).unwrap();
        assert_eq!(ds.routes[0].delivery_orders.len(), 1);
        assert_eq!(ds.routes[1].delivery_orders[0].id, 11);
        assert_eq!(ds.routes[1].total_orders, Some(1));
        assert!(!backend.board_dir.join(".lock").exists());
    }

    #[test]
    fn rejected_patch_leaves_file_alone() {
        let (_tmp, mut backend) = setup();
        let before = fs::read_to_string(backend.dataset_path()).unwrap();
        let err = backend
            .send_patch(&PatchRequest::order(99).with("route_id", 2i64))
            .unwrap_err();
        assert_eq!(err.status, 404);
        assert_eq!(fs::read_to_string(backend.dataset_path()).unwrap(), before);
    }

    #[test]
    fn missing_dataset_fetches_empty() {
        let tmp = TempDir::new().unwrap();
        let mut backend = FileBackend::new(tmp.path(), &tmp.path().join("dataset.json"));
        assert!(backend.fetch_dataset().unwrap().routes.is_empty());
    }

    #[test]
    fn malformed_dataset_is_server_error() {
        let (_tmp, mut backend) = setup();
        fs::write(backend.dataset_path(), "{ broken").unwrap();
        assert_eq!(backend.fetch_dataset().unwrap_err().status, 500);
    }
}
