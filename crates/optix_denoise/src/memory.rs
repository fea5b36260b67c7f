//! Minimal RAII types for the GPU allocations the denoiser drives, plus the
//! staging helpers callers use to move frames between host and device.

use std::marker::PhantomData;
use std::mem;
use std::os::raw::c_void;
use std::ptr;

use crate::error::{CudaResult, DropResult, ToResult};
use crate::sys;

/// Establish the CUDA runtime context on the current device.
///
/// The runtime API binds lazily; freeing the null pointer is the conventional
/// way to force initialization up front.
pub fn cuda_init() -> CudaResult<()> {
    unsafe { sys::cudaFree(ptr::null_mut()).to_result() }
}

/// Block until all work queued on the device has completed.
pub fn synchronize() -> CudaResult<()> {
    unsafe { sys::cudaDeviceSynchronize().to_result() }
}

/// Address of a device-resident buffer. Non-owning: holding a
/// `DevicePointer` neither keeps the allocation alive nor frees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct DevicePointer {
    raw: sys::CUdeviceptr,
}

impl DevicePointer {
    pub fn from_raw(raw: sys::CUdeviceptr) -> Self {
        Self { raw }
    }

    pub fn null() -> Self {
        Self { raw: 0 }
    }

    pub fn as_raw(self) -> sys::CUdeviceptr {
        self.raw
    }

    pub fn is_null(self) -> bool {
        self.raw == 0
    }
}

unsafe fn cuda_malloc(bytes: usize) -> CudaResult<DevicePointer> {
    if bytes == 0 {
        return Ok(DevicePointer::null());
    }
    let mut raw: *mut c_void = ptr::null_mut();
    sys::cudaMalloc(&mut raw as *mut *mut c_void, bytes).to_result()?;
    Ok(DevicePointer::from_raw(raw as sys::CUdeviceptr))
}

unsafe fn cuda_free(ptr: DevicePointer) -> CudaResult<()> {
    if ptr.is_null() {
        return Ok(());
    }
    sys::cudaFree(ptr.as_raw() as *mut c_void).to_result()
}

/// An owned, fixed-size allocation of `T`s in device memory.
#[derive(Debug)]
pub struct DeviceBuffer<T: Copy> {
    ptr: DevicePointer,
    len: usize,
    _marker: PhantomData<T>,
}

unsafe impl<T: Copy + Send> Send for DeviceBuffer<T> {}
unsafe impl<T: Copy + Sync> Sync for DeviceBuffer<T> {}

impl<T: Copy> DeviceBuffer<T> {
    /// Allocate room for `len` elements without initializing them.
    ///
    /// # Safety
    ///
    /// The contents must be written (by a copy or by the device) before they
    /// are read.
    pub unsafe fn uninitialized(len: usize) -> CudaResult<Self> {
        let ptr = cuda_malloc(len * mem::size_of::<T>())?;
        Ok(Self {
            ptr,
            len,
            _marker: PhantomData,
        })
    }

    /// Allocate device memory and copy `slice` into it.
    pub fn from_slice(slice: &[T]) -> CudaResult<Self> {
        // SAFETY: fully overwritten by the copy below before any read.
        let mut buf = unsafe { Self::uninitialized(slice.len())? };
        buf.copy_from(slice)?;
        Ok(buf)
    }

    pub fn as_device_ptr(&self) -> DevicePointer {
        self.ptr
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn size_in_bytes(&self) -> usize {
        self.len * mem::size_of::<T>()
    }

    /// Copy `slice` from the host into this allocation. The lengths must
    /// match exactly.
    pub fn copy_from(&mut self, slice: &[T]) -> CudaResult<()> {
        assert_eq!(
            self.len,
            slice.len(),
            "destination and source slices have different lengths"
        );
        if self.len == 0 {
            return Ok(());
        }
        unsafe {
            sys::cudaMemcpy(
                self.ptr.as_raw() as *mut c_void,
                slice.as_ptr() as *const c_void,
                self.size_in_bytes(),
                sys::cudaMemcpyKind::cudaMemcpyHostToDevice,
            )
            .to_result()
        }
    }

    /// Copy this allocation back into a host slice. The lengths must match
    /// exactly.
    pub fn copy_to(&self, slice: &mut [T]) -> CudaResult<()> {
        assert_eq!(
            self.len,
            slice.len(),
            "destination and source slices have different lengths"
        );
        if self.len == 0 {
            return Ok(());
        }
        unsafe {
            sys::cudaMemcpy(
                slice.as_mut_ptr() as *mut c_void,
                self.ptr.as_raw() as *const c_void,
                self.size_in_bytes(),
                sys::cudaMemcpyKind::cudaMemcpyDeviceToHost,
            )
            .to_result()
        }
    }

    /// Read the contents back into a freshly allocated host vector.
    pub fn as_host_vec(&self) -> CudaResult<Vec<T>>
    where
        T: Default,
    {
        let mut host = vec![T::default(); self.len];
        self.copy_to(&mut host)?;
        Ok(host)
    }

    /// Destroy the buffer, returning it (still allocated) alongside the error
    /// if the free fails.
    pub fn drop(buf: Self) -> DropResult<Self> {
        if buf.ptr.is_null() {
            mem::forget(buf);
            return Ok(());
        }
        let ptr = buf.ptr;
        match unsafe { cuda_free(ptr) } {
            Ok(()) => {
                mem::forget(buf);
                Ok(())
            }
            Err(e) => Err((e, buf)),
        }
    }
}

impl<T: Copy> Drop for DeviceBuffer<T> {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            // free failures are unreportable here; the checked path is
            // DeviceBuffer::drop
            let _ = unsafe { cuda_free(self.ptr) };
            self.ptr = DevicePointer::null();
            self.len = 0;
        }
    }
}

/// A single `T` in device memory.
#[derive(Debug)]
pub struct DeviceBox<T: Copy> {
    ptr: DevicePointer,
    _marker: PhantomData<T>,
}

unsafe impl<T: Copy + Send> Send for DeviceBox<T> {}
unsafe impl<T: Copy + Sync> Sync for DeviceBox<T> {}

impl<T: Copy> DeviceBox<T> {
    /// Allocate device memory and place `val` into it.
    pub fn new(val: &T) -> CudaResult<Self> {
        // SAFETY: fully overwritten by the copy below before any read.
        let mut dev_box = unsafe { Self::uninitialized()? };
        dev_box.copy_from(val)?;
        Ok(dev_box)
    }

    /// Allocate room for one `T` without initializing it.
    ///
    /// # Safety
    ///
    /// The value must be written before it is read.
    pub unsafe fn uninitialized() -> CudaResult<Self> {
        let ptr = cuda_malloc(mem::size_of::<T>())?;
        Ok(Self {
            ptr,
            _marker: PhantomData,
        })
    }

    pub fn as_device_ptr(&self) -> DevicePointer {
        self.ptr
    }

    pub fn copy_from(&mut self, val: &T) -> CudaResult<()> {
        unsafe {
            sys::cudaMemcpy(
                self.ptr.as_raw() as *mut c_void,
                val as *const T as *const c_void,
                mem::size_of::<T>(),
                sys::cudaMemcpyKind::cudaMemcpyHostToDevice,
            )
            .to_result()
        }
    }

    /// Read the value back from the GPU into host memory.
    pub fn as_host_value(&self) -> CudaResult<T>
    where
        T: Default,
    {
        let mut val = T::default();
        unsafe {
            sys::cudaMemcpy(
                &mut val as *mut T as *mut c_void,
                self.ptr.as_raw() as *const c_void,
                mem::size_of::<T>(),
                sys::cudaMemcpyKind::cudaMemcpyDeviceToHost,
            )
            .to_result()?;
        }
        Ok(val)
    }

    /// Destroy the box, returning it (still allocated) alongside the error if
    /// the free fails.
    pub fn drop(dev_box: Self) -> DropResult<Self> {
        if dev_box.ptr.is_null() {
            mem::forget(dev_box);
            return Ok(());
        }
        let ptr = dev_box.ptr;
        match unsafe { cuda_free(ptr) } {
            Ok(()) => {
                mem::forget(dev_box);
                Ok(())
            }
            Err(e) => Err((e, dev_box)),
        }
    }
}

impl<T: Copy> Drop for DeviceBox<T> {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            let _ = unsafe { cuda_free(self.ptr) };
            self.ptr = DevicePointer::null();
        }
    }
}
