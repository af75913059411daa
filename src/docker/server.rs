//! Volume-plugin HTTP server over a Unix socket.

use std::error::Error as _;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use tokio::net::UnixListener;
use tracing::{error, info};

use crate::commands::wait_for_shutdown;
use crate::docker::driver::{DriverError, VolumeDriver};
use crate::docker::protocol::{
    ActivateResponse, CapabilitiesResponse, GetResponse, ListResponse, PathResponse,
    SimpleResponse, Volume, VolumeRequest,
};

/// Build the plugin router.
pub fn router(driver: Arc<VolumeDriver>) -> Router {
    Router::new()
        .route("/Plugin.Activate", post(activate))
        .route("/VolumeDriver.Create", post(create))
        .route("/VolumeDriver.Remove", post(remove))
        .route("/VolumeDriver.Mount", post(mount))
        .route("/VolumeDriver.Unmount", post(unmount))
        .route("/VolumeDriver.Path", post(path))
        .route("/VolumeDriver.Get", post(get))
        .route("/VolumeDriver.List", post(list))
        .route("/VolumeDriver.Capabilities", post(capabilities))
        .with_state(driver)
}

/// Serve on `socket` until interrupted, then drain all mounted volumes.
pub async fn serve(driver: Arc<VolumeDriver>, socket: &Path) -> Result<()> {
    if let Some(parent) = socket.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("cannot create socket directory {}", parent.display()))?;
    }
    // A stale socket from a previous run would make bind fail.
    match tokio::fs::remove_file(socket).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(e).with_context(|| format!("cannot remove stale socket {}", socket.display()))
        }
    }

    let listener = UnixListener::bind(socket)
        .with_context(|| format!("cannot bind {}", socket.display()))?;
    info!(socket = %socket.display(), "serving unix socket");

    tokio::select! {
        result = axum::serve(listener, router(driver.clone())) => {
            result.context("plugin server failed")?;
        }
        _ = wait_for_shutdown() => {
            info!("shutting down plugin server");
        }
    }

    for (name, err) in driver.stop().await {
        error!(volume = %name, error = %error_chain(&err), "error stopping volume");
    }
    let _ = tokio::fs::remove_file(socket).await;
    Ok(())
}

/// Flatten an error and its sources for the in-band `Err` field.
fn error_chain(err: &DriverError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

async fn activate() -> Json<ActivateResponse> {
    Json(ActivateResponse::volume_driver())
}

async fn create(
    State(driver): State<Arc<VolumeDriver>>,
    Json(req): Json<VolumeRequest>,
) -> Json<SimpleResponse> {
    Json(match driver.create(&req.name) {
        Ok(()) => SimpleResponse::ok(),
        Err(err) => SimpleResponse::err(error_chain(&err)),
    })
}

async fn remove(
    State(driver): State<Arc<VolumeDriver>>,
    Json(req): Json<VolumeRequest>,
) -> Json<SimpleResponse> {
    Json(match driver.remove(&req.name).await {
        Ok(()) => SimpleResponse::ok(),
        Err(err) => SimpleResponse::err(error_chain(&err)),
    })
}

async fn mount(
    State(driver): State<Arc<VolumeDriver>>,
    Json(req): Json<VolumeRequest>,
) -> Json<PathResponse> {
    Json(match driver.mount(&req.name).await {
        Ok(mountpoint) => PathResponse {
            mountpoint: mountpoint.display().to_string(),
            err: String::new(),
        },
        Err(err) => PathResponse {
            mountpoint: String::new(),
            err: error_chain(&err),
        },
    })
}

async fn unmount(
    State(driver): State<Arc<VolumeDriver>>,
    Json(req): Json<VolumeRequest>,
) -> Json<SimpleResponse> {
    Json(match driver.unmount(&req.name).await {
        Ok(()) => SimpleResponse::ok(),
        Err(err) => SimpleResponse::err(error_chain(&err)),
    })
}

async fn path(
    State(driver): State<Arc<VolumeDriver>>,
    Json(req): Json<VolumeRequest>,
) -> Json<PathResponse> {
    Json(match driver.path(&req.name).await {
        Some(mountpoint) => PathResponse {
            mountpoint: mountpoint.display().to_string(),
            err: String::new(),
        },
        None => PathResponse {
            mountpoint: String::new(),
            err: format!("no such volume: {}", req.name),
        },
    })
}

async fn get(
    State(driver): State<Arc<VolumeDriver>>,
    Json(req): Json<VolumeRequest>,
) -> Json<GetResponse> {
    Json(match driver.path(&req.name).await {
        Some(mountpoint) => GetResponse {
            volume: Some(Volume {
                name: req.name,
                mountpoint: mountpoint.display().to_string(),
            }),
            err: String::new(),
        },
        None => GetResponse {
            volume: None,
            err: format!("no such volume: {}", req.name),
        },
    })
}

async fn list(State(driver): State<Arc<VolumeDriver>>) -> Json<ListResponse> {
    let volumes = driver
        .list()
        .await
        .into_iter()
        .map(|(name, mountpoint)| Volume {
            name,
            mountpoint: mountpoint.display().to_string(),
        })
        .collect();
    Json(ListResponse {
        volumes,
        err: String::new(),
    })
}

async fn capabilities() -> Json<CapabilitiesResponse> {
    Json(CapabilitiesResponse::local())
}
