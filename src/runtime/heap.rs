//! In-process object system
//!
//! `LocalHeap` implements the `ObjectSystem` contract without the external
//! native library. It backs the test suite and lets the bridge be embedded
//! where the real library is not linked. It models exactly the contract
//! surface the bridge touches:
//! - Heap objects with an atomic refcount header
//! - Strings, errors, byte buffers, vectors and plain class instances
//! - Raising and trapping through the hooks injected at boot
//!
//! Every object is a boxed `LocalObject`; a handle is the box address.

use super::abi::{AttemptFn, Hooks, ObjPtr, ObjectSystem};
use super::abi_version::ABI_VERSION;
use libc::c_void;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering, fence};
use std::sync::{Arc, Mutex, OnceLock};

pub const STRING_CLASS: &str = "Clownfish::String";
pub const ERR_CLASS: &str = "Clownfish::Err";
pub const BYTEBUF_CLASS: &str = "Clownfish::ByteBuf";
pub const VECTOR_CLASS: &str = "Clownfish::Vector";

// =========================================================================
// Object Headers
// =========================================================================

/// Type tag for heap objects (stored in object header).
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjectKind {
    /// An instance of some class with no text representation of its own.
    Obj = 0,
    /// A string (UTF-8 encoded).
    String = 1,
    /// An error carrying a string message.
    Err = 2,
    /// Raw bytes, not necessarily UTF-8.
    ByteBuf = 3,
    /// An ordered collection owning one unit of each element.
    Vector = 4,
}

/// Header for all heap objects.
#[repr(C)]
pub struct ObjectHeader {
    /// Object type tag.
    pub kind: ObjectKind,
    /// Strong reference count. Objects are born with one unit.
    pub refcount: AtomicU32,
}

impl ObjectHeader {
    pub fn new(kind: ObjectKind) -> Self {
        Self {
            kind,
            refcount: AtomicU32::new(1),
        }
    }
}

enum Payload {
    Obj { class: String },
    String(Box<[u8]>),
    Err { mess: ObjPtr },
    ByteBuf(Box<[u8]>),
    Vector(Mutex<Vec<ObjPtr>>),
}

#[repr(C)]
struct LocalObject {
    header: ObjectHeader,
    payload: Payload,
}

// =========================================================================
// Local Heap
// =========================================================================

#[derive(Default)]
struct HeapState {
    hooks: OnceLock<Hooks>,
    /// Objects currently alive.
    live: AtomicUsize,
    /// Objects ever allocated (for stats).
    total_allocated: AtomicUsize,
}

/// An in-process object system.
///
/// Cloning is cheap and yields another handle to the same heap, so tests can
/// keep one for introspection after handing the other to `bootstrap`.
#[derive(Clone, Default)]
pub struct LocalHeap {
    state: Arc<HeapState>,
}

impl LocalHeap {
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc(&self, kind: ObjectKind, payload: Payload) -> ObjPtr {
        let obj = Box::new(LocalObject {
            header: ObjectHeader::new(kind),
            payload,
        });
        self.state.live.fetch_add(1, Ordering::Relaxed);
        self.state.total_allocated.fetch_add(1, Ordering::Relaxed);
        ObjPtr::from_ptr(Box::into_raw(obj).cast::<c_void>())
    }

    /// # Safety
    /// `ptr` must be a live handle from a LocalHeap.
    unsafe fn object<'a>(ptr: ObjPtr) -> &'a LocalObject {
        unsafe { &*ptr.cast::<LocalObject>() }
    }

    /// # Safety
    /// `ptr` must be a live handle whose count just reached zero.
    unsafe fn destroy(&self, ptr: ObjPtr) {
        let obj = unsafe { *Box::from_raw(ptr.cast::<LocalObject>()) };
        self.state.live.fetch_sub(1, Ordering::Relaxed);
        match obj.payload {
            Payload::Err { mess } => unsafe {
                self.dec_refcount(mess);
            },
            Payload::Vector(items) => {
                let items = items.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner());
                for item in items {
                    unsafe {
                        self.dec_refcount(item);
                    }
                }
            }
            Payload::Obj { .. } | Payload::String(_) | Payload::ByteBuf(_) => {}
        }
    }

    fn alloc_string(&self, text: &str) -> ObjPtr {
        self.alloc(
            ObjectKind::String,
            Payload::String(text.as_bytes().to_vec().into_boxed_slice()),
        )
    }

    fn hooks(&self) -> Hooks {
        match self.state.hooks.get() {
            Some(hooks) => *hooks,
            None => panic!("LocalHeap used before boot"),
        }
    }

    /// Allocate an instance of `class` with no payload.
    pub fn new_obj(&self, class: &str) -> ObjPtr {
        self.alloc(
            ObjectKind::Obj,
            Payload::Obj {
                class: class.to_string(),
            },
        )
    }

    /// Allocate a byte buffer holding a copy of `bytes`.
    pub fn new_bytebuf(&self, bytes: &[u8]) -> ObjPtr {
        self.alloc(ObjectKind::ByteBuf, Payload::ByteBuf(bytes.into()))
    }

    /// Allocate an empty vector.
    pub fn new_vector(&self) -> ObjPtr {
        self.alloc(ObjectKind::Vector, Payload::Vector(Mutex::new(Vec::new())))
    }

    /// Append `item` to `vec`, taking over the caller's unit of `item`.
    /// Raises if `vec` is not a vector.
    ///
    /// # Safety
    /// Both handles must be live; the caller must own the unit of `item`.
    pub unsafe fn vec_push(&self, vec: ObjPtr, item: ObjPtr) {
        match unsafe { &Self::object(vec).payload } {
            Payload::Vector(items) => items
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .push(item),
            _ => {
                unsafe {
                    self.dec_refcount(item);
                }
                self.throw_message("Not a Vector")
            }
        }
    }

    /// Number of elements in a vector, zero for anything else.
    ///
    /// # Safety
    /// `vec` must be a live handle.
    pub unsafe fn vec_len(&self, vec: ObjPtr) -> usize {
        match unsafe { &Self::object(vec).payload } {
            Payload::Vector(items) => items
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .len(),
            _ => 0,
        }
    }

    /// Kind tag of a live object.
    ///
    /// # Safety
    /// `ptr` must be a live handle.
    pub unsafe fn kind(&self, ptr: ObjPtr) -> ObjectKind {
        unsafe { Self::object(ptr).header.kind }
    }

    /// Current refcount of a live object.
    ///
    /// # Safety
    /// `ptr` must be a live handle.
    pub unsafe fn refcount(&self, ptr: ObjPtr) -> u32 {
        unsafe { Self::object(ptr).header.refcount.load(Ordering::Acquire) }
    }

    /// Objects currently alive on this heap.
    pub fn live_objects(&self) -> usize {
        self.state.live.load(Ordering::Relaxed)
    }

    /// Objects ever allocated on this heap.
    pub fn total_allocated(&self) -> usize {
        self.state.total_allocated.load(Ordering::Relaxed)
    }

    /// True once `boot` has installed the host hooks.
    pub fn is_booted(&self) -> bool {
        self.state.hooks.get().is_some()
    }

    /// Raise `err` through the injected raise hook, handing it our unit.
    pub fn throw(&self, err: ObjPtr) -> ! {
        (self.hooks().raise)(err)
    }

    /// Build an error with `mess` and raise it.
    pub fn throw_message(&self, mess: &str) -> ! {
        let hooks = self.hooks();
        let mess = self.alloc_string(mess);
        let err = self.alloc(ObjectKind::Err, Payload::Err { mess });
        (hooks.raise)(err)
    }

    /// Run `routine(context)` through the injected trap hook.
    ///
    /// Returns the owned error handle if the routine raised.
    ///
    /// # Safety
    /// `routine` must be safe to call with `context`.
    pub unsafe fn attempt(&self, routine: AttemptFn, context: *mut c_void) -> Option<ObjPtr> {
        let err = unsafe { (self.hooks().trap)(routine, context) };
        (!err.is_null()).then_some(err)
    }
}

impl std::fmt::Debug for LocalHeap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalHeap")
            .field("live", &self.live_objects())
            .field("total_allocated", &self.total_allocated())
            .field("booted", &self.is_booted())
            .finish()
    }
}

impl ObjectSystem for LocalHeap {
    fn abi_version(&self) -> u32 {
        ABI_VERSION
    }

    fn boot(&self, hooks: Hooks) {
        if self.state.hooks.set(hooks).is_err() {
            tracing::debug!("LocalHeap already booted, keeping existing hooks");
        }
    }

    unsafe fn inc_refcount(&self, obj: ObjPtr) -> ObjPtr {
        if !obj.is_null() {
            let header = unsafe { &Self::object(obj).header };
            header.refcount.fetch_add(1, Ordering::Relaxed);
        }
        obj
    }

    unsafe fn dec_refcount(&self, obj: ObjPtr) -> u32 {
        if obj.is_null() {
            return 0;
        }
        let header = unsafe { &Self::object(obj).header };
        match header.refcount.fetch_sub(1, Ordering::Release) {
            0 => panic!("refcount underflow on {:?}", obj),
            1 => {
                fence(Ordering::Acquire);
                unsafe { self.destroy(obj) };
                0
            }
            prev => prev - 1,
        }
    }

    fn str_new_steal_utf8(&self, bytes: Box<[u8]>) -> ObjPtr {
        if std::str::from_utf8(&bytes).is_err() {
            drop(bytes);
            self.throw_message("Invalid UTF-8");
        }
        self.alloc(ObjectKind::String, Payload::String(bytes))
    }

    unsafe fn err_new(&self, mess: ObjPtr) -> ObjPtr {
        self.alloc(ObjectKind::Err, Payload::Err { mess })
    }

    unsafe fn err_get_mess(&self, err: ObjPtr) -> ObjPtr {
        match unsafe { &Self::object(err).payload } {
            Payload::Err { mess } => *mess,
            _ => ObjPtr::null(),
        }
    }

    unsafe fn is_string(&self, obj: ObjPtr) -> bool {
        unsafe { self.kind(obj) == ObjectKind::String }
    }

    unsafe fn to_string(&self, obj: ObjPtr) -> ObjPtr {
        match unsafe { &Self::object(obj).payload } {
            Payload::String(_) => unsafe { self.inc_refcount(obj) },
            Payload::Err { mess } if !mess.is_null() => unsafe { self.inc_refcount(*mess) },
            Payload::Err { .. } => self.alloc_string(""),
            Payload::ByteBuf(bytes) => match std::str::from_utf8(bytes) {
                Ok(text) => self.alloc_string(text),
                Err(_) => self.throw_message("Invalid UTF-8"),
            },
            Payload::Vector(_) => self.alloc_string(&format!("{}@{:p}", VECTOR_CLASS, obj)),
            Payload::Obj { class } => self.alloc_string(&format!("{}@{:p}", class, obj)),
        }
    }

    unsafe fn str_bytes(&self, s: ObjPtr) -> (*const u8, usize) {
        match unsafe { &Self::object(s).payload } {
            Payload::String(bytes) => (bytes.as_ptr(), bytes.len()),
            _ => (std::ptr::null(), 0),
        }
    }

    unsafe fn class_name(&self, obj: ObjPtr) -> String {
        match unsafe { &Self::object(obj).payload } {
            Payload::Obj { class } => class.clone(),
            Payload::String(_) => STRING_CLASS.to_string(),
            Payload::Err { .. } => ERR_CLASS.to_string(),
            Payload::ByteBuf(_) => BYTEBUF_CLASS.to_string(),
            Payload::Vector(_) => VECTOR_CLASS.to_string(),
        }
    }
}
