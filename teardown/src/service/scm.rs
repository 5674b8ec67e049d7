//! Windows service control manager glue.
//!
//! Enumeration reads every installed service together with its registered
//! command line; stop and unregister go through the `windows-service` crate.
//! All policy (which services match, what a failed step means) lives in the
//! platform-independent modules.

use super::{
    matches_generation, ServiceController, ServiceError, ServiceRecord, ServiceRuntimeState,
};
use crate::utils::retry::retry;
use std::time::Duration;
use tracing::{debug, info};
use windows_service::service::{ServiceAccess, ServiceState};
use windows_service::service_manager::{ServiceManager, ServiceManagerAccess};
use windows_sys::Win32::Foundation::{
    GetLastError, ERROR_INSUFFICIENT_BUFFER, ERROR_MORE_DATA, ERROR_SERVICE_DOES_NOT_EXIST,
};
use windows_sys::Win32::Security::SC_HANDLE;
use windows_sys::Win32::System::Services::{
    CloseServiceHandle, EnumServicesStatusExW, OpenSCManagerW, OpenServiceW, QueryServiceConfigW,
    ENUM_SERVICE_STATUS_PROCESSW, QUERY_SERVICE_CONFIGW, SC_ENUM_PROCESS_INFO, SC_MANAGER_CONNECT,
    SC_MANAGER_ENUMERATE_SERVICE, SERVICE_QUERY_CONFIG, SERVICE_RUNNING, SERVICE_STATE_ALL,
    SERVICE_STOPPED, SERVICE_WIN32,
};

const STOP_WAIT_ATTEMPTS: usize = 30;
const STOP_POLL_INTERVAL: Duration = Duration::from_secs(1);

const ENUM_BUFFER_SIZE: usize = 0x10000;

/// [`ServiceController`] implementation talking to the local SC manager.
#[derive(Default)]
pub struct ScManager;

impl ScManager {
    pub fn new() -> Self {
        Self
    }

    fn connect(&self) -> Result<ServiceManager, ServiceError> {
        ServiceManager::local_computer(None::<&str>, ServiceManagerAccess::CONNECT)
            .map_err(|err| ServiceError::Manager(err.to_string()))
    }
}

impl ServiceController for ScManager {
    fn stop_and_wait(&mut self, name: &str) -> Result<(), ServiceError> {
        let manager = self.connect()?;
        let service =
            match manager.open_service(name, ServiceAccess::QUERY_STATUS | ServiceAccess::STOP) {
                Ok(service) => service,
                Err(err) if is_service_gone(&err) => return Ok(()),
                Err(err) => return Err(ServiceError::Stop(name.to_string(), err.to_string())),
            };

        let status = service
            .query_status()
            .map_err(|err| ServiceError::Stop(name.to_string(), err.to_string()))?;
        if status.current_state != ServiceState::Stopped {
            info!(service = name, "requesting service stop");
            service
                .stop()
                .map_err(|err| ServiceError::Stop(name.to_string(), err.to_string()))?;
        }

        retry(STOP_WAIT_ATTEMPTS, STOP_POLL_INTERVAL, || {
            let status = service
                .query_status()
                .map_err(|err| ServiceError::Stop(name.to_string(), err.to_string()))?;
            if status.current_state == ServiceState::Stopped {
                Ok(())
            } else {
                Err(ServiceError::Stop(
                    name.to_string(),
                    "service has not reached the stopped state".to_string(),
                ))
            }
        })
    }

    fn unregister(&mut self, name: &str) -> Result<(), ServiceError> {
        let manager = self.connect()?;
        let service = match manager.open_service(name, ServiceAccess::DELETE) {
            Ok(service) => service,
            Err(err) if is_service_gone(&err) => return Ok(()),
            Err(err) => return Err(ServiceError::Unregister(name.to_string(), err.to_string())),
        };
        info!(service = name, "removing service registration");
        service
            .delete()
            .map_err(|err| ServiceError::Unregister(name.to_string(), err.to_string()))
    }
}

fn is_service_gone(err: &windows_service::Error) -> bool {
    matches!(err, windows_service::Error::Winapi(io_err)
        if io_err.raw_os_error() == Some(ERROR_SERVICE_DOES_NOT_EXIST as i32))
}

/// Reads a snapshot of every installed service whose name belongs to a
/// tunnelmgr generation, together with its registered command line.
pub fn enumerate_product_services() -> Result<Vec<ServiceRecord>, ServiceError> {
    unsafe {
        let scm = OpenSCManagerW(
            std::ptr::null(),
            std::ptr::null(),
            SC_MANAGER_CONNECT | SC_MANAGER_ENUMERATE_SERVICE,
        );
        if scm.is_null() {
            return Err(ServiceError::Manager(format!(
                "OpenSCManager failed ({})",
                GetLastError()
            )));
        }

        let result = enumerate_from(scm);
        CloseServiceHandle(scm);
        result
    }
}

unsafe fn enumerate_from(scm: SC_HANDLE) -> Result<Vec<ServiceRecord>, ServiceError> {
    // u64-backed buffer keeps the entry array properly aligned.
    let mut buffer = vec![0u64; ENUM_BUFFER_SIZE / std::mem::size_of::<u64>()];
    let mut records = Vec::new();
    let mut resume = 0u32;

    let mut more = true;
    while more {
        let mut bytes_needed = 0u32;
        let mut count = 0u32;
        let ok = EnumServicesStatusExW(
            scm,
            SC_ENUM_PROCESS_INFO,
            SERVICE_WIN32,
            SERVICE_STATE_ALL,
            buffer.as_mut_ptr() as *mut u8,
            ENUM_BUFFER_SIZE as u32,
            &mut bytes_needed,
            &mut count,
            &mut resume,
            std::ptr::null(),
        );
        if ok != 0 {
            more = false;
        } else {
            let last_error = GetLastError();
            if last_error != ERROR_MORE_DATA {
                return Err(ServiceError::Enumerate(format!(
                    "EnumServicesStatusEx failed ({last_error})"
                )));
            }
        }

        let entries = std::slice::from_raw_parts(
            buffer.as_ptr() as *const ENUM_SERVICE_STATUS_PROCESSW,
            count as usize,
        );
        for entry in entries {
            let name = from_wide_ptr(entry.lpServiceName);
            if !matches_generation(&name) {
                continue;
            }
            let Some(command_line) = query_command_line(scm, entry.lpServiceName) else {
                // Config unreadable (access denied or the service vanished
                // mid-enumeration); skip the candidate.
                debug!(service = name, "skipping service without readable config");
                continue;
            };
            records.push(ServiceRecord {
                name,
                command_line,
                state: runtime_state(entry.ServiceStatusProcess.dwCurrentState),
            });
        }
    }
    Ok(records)
}

unsafe fn query_command_line(scm: SC_HANDLE, wide_name: *const u16) -> Option<String> {
    let service = OpenServiceW(scm, wide_name, SERVICE_QUERY_CONFIG);
    if service.is_null() {
        return None;
    }

    let mut bytes_needed = 0u32;
    let probed = QueryServiceConfigW(service, std::ptr::null_mut(), 0, &mut bytes_needed);
    if probed != 0 || GetLastError() != ERROR_INSUFFICIENT_BUFFER {
        CloseServiceHandle(service);
        return None;
    }

    let mut config_buffer = vec![0u64; bytes_needed.div_ceil(8) as usize];
    let config = config_buffer.as_mut_ptr() as *mut QUERY_SERVICE_CONFIGW;
    let ok = QueryServiceConfigW(service, config, bytes_needed, &mut bytes_needed);
    CloseServiceHandle(service);
    if ok == 0 {
        return None;
    }
    Some(from_wide_ptr((*config).lpBinaryPathName))
}

fn runtime_state(current_state: u32) -> ServiceRuntimeState {
    match current_state {
        SERVICE_RUNNING => ServiceRuntimeState::Running,
        SERVICE_STOPPED => ServiceRuntimeState::Stopped,
        _ => ServiceRuntimeState::Other,
    }
}

unsafe fn from_wide_ptr(ptr: *const u16) -> String {
    if ptr.is_null() {
        return String::new();
    }
    let mut len = 0usize;
    while *ptr.add(len) != 0 {
        len += 1;
    }
    String::from_utf16_lossy(std::slice::from_raw_parts(ptr, len))
}
