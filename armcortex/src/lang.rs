//! Language items a bare-metal build needs.

/// This will be invoked on `panic!`.  Applications can override this by
/// enabling the `app_panic_handler` feature and defining their own.
#[cfg(all(target_os = "none", not(feature = "app_panic_handler")))]
#[panic_handler]
fn panic(_info: &core::panic::PanicInfo) -> ! {
    loop {}
}
