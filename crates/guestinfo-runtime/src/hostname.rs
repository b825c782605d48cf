use std::ffi::{CStr, CString};

use tracing::{debug, warn};

/// Fully-qualified name of this host.
///
/// Starts from `gethostname(2)` and asks the resolver for the canonical
/// name; if the lookup fails the plain hostname is returned.
pub fn fqdn() -> Option<String> {
    let host = local_hostname()?;
    match canonical_name(&host) {
        Some(canon) => Some(canon),
        None => {
            debug!(host = %host, "no canonical name, using hostname");
            Some(host)
        }
    }
}

fn local_hostname() -> Option<String> {
    let mut buf = [0u8; 256];
    // SAFETY: buf is valid for buf.len() bytes; gethostname NUL-terminates
    // on success when the name fits.
    let rc = unsafe { libc::gethostname(buf.as_mut_ptr().cast(), buf.len()) };
    if rc != 0 {
        warn!(error = %std::io::Error::last_os_error(), "gethostname failed");
        return None;
    }
    let len = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    let name = String::from_utf8_lossy(&buf[..len]).trim().to_string();
    (!name.is_empty()).then_some(name)
}

fn canonical_name(host: &str) -> Option<String> {
    let c_host = CString::new(host).ok()?;
    // SAFETY: addrinfo is a plain C struct; all-zero is a valid hints value.
    let mut hints: libc::addrinfo = unsafe { std::mem::zeroed() };
    hints.ai_family = libc::AF_UNSPEC;
    hints.ai_flags = libc::AI_CANONNAME;

    let mut res: *mut libc::addrinfo = std::ptr::null_mut();
    // SAFETY: c_host and hints outlive the call; res is freed below.
    let rc = unsafe { libc::getaddrinfo(c_host.as_ptr(), std::ptr::null(), &hints, &mut res) };
    if rc != 0 || res.is_null() {
        return None;
    }

    // SAFETY: res is a valid list returned by getaddrinfo until freeaddrinfo.
    let name = unsafe {
        let canon = (*res).ai_canonname;
        let name = if canon.is_null() {
            None
        } else {
            Some(CStr::from_ptr(canon).to_string_lossy().into_owned())
        };
        libc::freeaddrinfo(res);
        name
    };
    name.filter(|n| !n.is_empty())
}
