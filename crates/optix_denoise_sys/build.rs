use std::env;
use std::path::PathBuf;

use find_cuda_helper::{find_cuda_lib_dirs, find_cuda_root, find_optix_root};

// OptiX is a bit exotic in how it provides its functions. A function table
// struct holds pointers to every entry point, the driver dll is loaded at
// runtime, and the table is filled from it. The SDK ships that logic in
// optix_stubs.h, so we compile it into a static lib and link it in.
//
// When the SDK or the CUDA toolkit cannot be found, the crate falls back to
// a host-side simulation of the same symbols (see src/stub.rs) so that the
// wrapper still builds, documents, and runs its contract tests.
fn main() {
    println!("cargo:rustc-check-cfg=cfg(optix_denoise_stub)");
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=optix_stubs.c");
    for var in [
        "OPTIX_ROOT",
        "OPTIX_ROOT_DIR",
        "CUDA_PATH",
        "CUDA_ROOT",
        "CUDA_TOOLKIT_ROOT_DIR",
        "CUDA_LIBRARY_PATH",
    ] {
        println!("cargo:rerun-if-env-changed={}", var);
    }

    if env::var_os("DOCS_RS").is_some() {
        emit_stub_mode("docs.rs build");
        return;
    }

    let optix_include = match find_optix_root().map(|root| root.join("include")) {
        Some(dir) if dir.join("optix.h").is_file() => dir,
        _ => {
            emit_stub_mode("OptiX SDK not found (set OPTIX_ROOT or OPTIX_ROOT_DIR)");
            return;
        }
    };

    let cuda_include = match find_cuda_root().map(|root| root.join("include")) {
        Some(dir) if dir.join("cuda.h").is_file() => dir,
        _ => {
            emit_stub_mode("CUDA toolkit not found (set CUDA_ROOT, CUDA_PATH or CUDA_TOOLKIT_ROOT_DIR)");
            return;
        }
    };

    cc::Build::new()
        .file("./optix_stubs.c")
        .include(optix_include)
        .include(cuda_include)
        .cpp(false)
        .compile("optix_stubs");

    let out_dir = env::var("OUT_DIR").unwrap();
    println!("cargo:rustc-link-search=native={}", out_dir);
    println!("cargo:rustc-link-lib=static=optix_stubs");

    for dir in cudart_lib_dirs() {
        println!("cargo:rustc-link-search=native={}", dir.display());
    }
    println!("cargo:rustc-link-lib=dylib=cudart");
    if cfg!(target_os = "linux") {
        // optix_stubs resolves the driver entry points with dlopen.
        println!("cargo:rustc-link-lib=dylib=dl");
    }
}

fn emit_stub_mode(reason: &str) {
    println!(
        "cargo:warning=building optix_denoise_sys in simulation mode: {}",
        reason
    );
    println!("cargo:rustc-cfg=optix_denoise_stub");
}

fn cudart_lib_dirs() -> Vec<PathBuf> {
    let mut dirs = find_cuda_lib_dirs();
    if let Some(root) = find_cuda_root() {
        for sub in ["lib64", "lib", "targets/x86_64-linux/lib"] {
            let dir = root.join(sub);
            if dir.is_dir() && !dirs.contains(&dir) {
                dirs.push(dir);
            }
        }
    }
    dirs.retain(|dir| dir.is_dir());
    dirs
}
