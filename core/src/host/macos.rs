//! Counters and the System Management Controller on macOS.

use super::{ControllerBuffer, ControllerConnection, CoreTicks, MemoryStats, CONTROLLER_BUFFER_LEN};
use crate::SensorError;
use std::ffi::{c_char, c_void, CStr};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[allow(non_camel_case_types)]
type kern_return_t = i32;
#[allow(non_camel_case_types)]
type mach_port_t = u32;
#[allow(non_camel_case_types)]
type io_object_t = u32;
#[allow(non_camel_case_types)]
type io_connect_t = u32;

const KERN_SUCCESS: kern_return_t = 0;
const K_IO_MAIN_PORT_DEFAULT: mach_port_t = 0;

const PROCESSOR_CPU_LOAD_INFO: i32 = 2;
const CPU_STATE_MAX: usize = 4;
const CPU_STATE_USER: usize = 0;
const CPU_STATE_SYSTEM: usize = 1;
const CPU_STATE_IDLE: usize = 2;
const CPU_STATE_NICE: usize = 3;

/// Struct-method selector of the AppleSMC user client.
const SMC_HANDLE_YPC_EVENT: u32 = 2;

extern "C" {
    static mach_task_self_: mach_port_t;
    fn mach_host_self() -> mach_port_t;
    fn host_processor_info(
        host: mach_port_t,
        flavor: i32,
        out_processor_count: *mut u32,
        out_processor_info: *mut *mut i32,
        out_processor_info_count: *mut u32,
    ) -> kern_return_t;
    fn vm_deallocate(target_task: mach_port_t, address: usize, size: usize) -> kern_return_t;
}

#[link(name = "IOKit", kind = "framework")]
extern "C" {
    fn IOServiceMatching(name: *const c_char) -> *mut c_void;
    fn IOServiceGetMatchingService(main_port: mach_port_t, matching: *mut c_void) -> io_object_t;
    fn IOServiceOpen(
        service: io_object_t,
        owning_task: mach_port_t,
        connect_type: u32,
        connect: *mut io_connect_t,
    ) -> kern_return_t;
    fn IOServiceClose(connect: io_connect_t) -> kern_return_t;
    fn IOObjectRelease(object: io_object_t) -> kern_return_t;
    fn IOConnectCallStructMethod(
        connection: io_connect_t,
        selector: u32,
        input: *const c_void,
        input_size: usize,
        output: *mut c_void,
        output_size: *mut usize,
    ) -> kern_return_t;
}

fn task_self() -> mach_port_t {
    // SAFETY: mach_task_self_ is initialized by the runtime before main.
    unsafe { mach_task_self_ }
}

/// Per-core tick counters from `host_processor_info`.
pub fn tick_counters() -> Result<Vec<CoreTicks>, SensorError> {
    let mut cpu_count: u32 = 0;
    let mut info: *mut i32 = std::ptr::null_mut();
    let mut info_count: u32 = 0;

    // SAFETY: all out-pointers are valid locals; the kernel allocates `info`.
    let kr = unsafe {
        host_processor_info(
            mach_host_self(),
            PROCESSOR_CPU_LOAD_INFO,
            &mut cpu_count,
            &mut info,
            &mut info_count,
        )
    };
    if kr != KERN_SUCCESS || info.is_null() {
        return Err(SensorError::platform("host_processor_info", kr));
    }

    let len = cpu_count as usize * CPU_STATE_MAX;
    // SAFETY: the kernel returned `info_count` integers, at least
    // CPU_STATE_MAX per reported processor.
    let raw = unsafe { std::slice::from_raw_parts(info, len.min(info_count as usize)) };
    let cores = raw
        .chunks_exact(CPU_STATE_MAX)
        .map(|c| CoreTicks {
            user: u64::from(c[CPU_STATE_USER] as u32),
            system: u64::from(c[CPU_STATE_SYSTEM] as u32),
            nice: u64::from(c[CPU_STATE_NICE] as u32),
            idle: u64::from(c[CPU_STATE_IDLE] as u32),
        })
        .collect();

    // SAFETY: releases exactly the region handed out above.
    unsafe {
        vm_deallocate(
            task_self(),
            info as usize,
            info_count as usize * std::mem::size_of::<i32>(),
        );
    }

    Ok(cores)
}

fn sysctl_raw<T: Copy + Default>(name: &CStr) -> Result<T, SensorError> {
    let mut value = T::default();
    let mut size = std::mem::size_of::<T>();
    // SAFETY: `value` is a valid buffer of `size` bytes.
    let rc = unsafe {
        libc::sysctlbyname(
            name.as_ptr(),
            (&mut value as *mut T).cast(),
            &mut size,
            std::ptr::null_mut(),
            0,
        )
    };
    if rc != 0 || size != std::mem::size_of::<T>() {
        return Err(SensorError::platform("sysctlbyname", rc));
    }
    Ok(value)
}

#[repr(C)]
#[derive(Clone, Copy, Default)]
struct SwapUsage {
    total: u64,
    avail: u64,
    used: u64,
    pagesize: u32,
    encrypted: u8,
}

/// Memory statistics from sysctl.
///
/// Only free pages count as available.
pub fn memory_stats() -> Result<MemoryStats, SensorError> {
    let total: u64 = sysctl_raw(c"hw.memsize")?;
    let page_size = u64::from(sysctl_raw::<u32>(c"hw.pagesize")?);
    let free_pages = u64::from(sysctl_raw::<u32>(c"vm.page_free_count")?);
    let swap: SwapUsage = sysctl_raw(c"vm.swapusage").unwrap_or_default();

    let free = free_pages * page_size;
    Ok(MemoryStats {
        total,
        free,
        available: free.min(total),
        swap_total: swap.total,
        swap_free: swap.avail,
    })
}

/// Time since `kern.boottime`.
pub fn uptime() -> Result<Duration, SensorError> {
    #[repr(C)]
    #[derive(Clone, Copy, Default)]
    struct Timeval {
        sec: i64,
        usec: i32,
    }

    let boot: Timeval = sysctl_raw(c"kern.boottime")?;
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|_| SensorError::invalid_data("system clock before epoch"))?;
    let boot = Duration::new(boot.sec.max(0) as u64, (boot.usec.max(0) as u32) * 1000);
    Ok(now.saturating_sub(boot))
}

/// An open user-client connection to the AppleSMC service.
///
/// Closed in `Drop`.
#[derive(Debug)]
pub struct SmcConnection {
    connection: io_connect_t,
}

impl SmcConnection {
    pub fn open() -> Result<Self, SensorError> {
        // SAFETY: IOServiceMatching copies the class name; the returned
        // dictionary is consumed by IOServiceGetMatchingService.
        let service = unsafe {
            let matching = IOServiceMatching(c"AppleSMC".as_ptr());
            if matching.is_null() {
                return Err(SensorError::unavailable("AppleSMC matching dictionary"));
            }
            IOServiceGetMatchingService(K_IO_MAIN_PORT_DEFAULT, matching)
        };
        if service == 0 {
            return Err(SensorError::unavailable("AppleSMC service not found"));
        }

        let mut connection: io_connect_t = 0;
        // SAFETY: `service` is a valid object released right after opening.
        let kr = unsafe {
            let kr = IOServiceOpen(service, task_self(), 0, &mut connection);
            IOObjectRelease(service);
            kr
        };
        if kr != KERN_SUCCESS {
            return Err(SensorError::platform("IOServiceOpen", kr));
        }

        tracing::trace!(connection, "opened AppleSMC connection");
        Ok(Self { connection })
    }
}

impl ControllerConnection for SmcConnection {
    fn call(&mut self, request: &ControllerBuffer) -> Result<ControllerBuffer, SensorError> {
        let mut reply: ControllerBuffer = [0; CONTROLLER_BUFFER_LEN];
        let mut reply_size = CONTROLLER_BUFFER_LEN;
        // SAFETY: both buffers are CONTROLLER_BUFFER_LEN bytes, matching the
        // user client's struct size.
        let kr = unsafe {
            IOConnectCallStructMethod(
                self.connection,
                SMC_HANDLE_YPC_EVENT,
                request.as_ptr().cast(),
                CONTROLLER_BUFFER_LEN,
                reply.as_mut_ptr().cast(),
                &mut reply_size,
            )
        };
        if kr != KERN_SUCCESS {
            return Err(SensorError::platform("IOConnectCallStructMethod", kr));
        }
        if reply_size != CONTROLLER_BUFFER_LEN {
            return Err(SensorError::invalid_data_with_value(
                "short controller reply",
                reply_size.to_string(),
            ));
        }
        Ok(reply)
    }
}

impl Drop for SmcConnection {
    fn drop(&mut self) {
        // SAFETY: the connection was opened by IOServiceOpen and is closed once.
        unsafe {
            IOServiceClose(self.connection);
        }
        tracing::trace!(connection = self.connection, "closed AppleSMC connection");
    }
}
