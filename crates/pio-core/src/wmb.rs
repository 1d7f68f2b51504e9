//! Write multi-buffer (C5): coalesces successive `write_darray` calls that
//! share a decomposition and record-variable-ness into one contiguous
//! payload, so a flush can write many variables in one rearrangement.

use crate::error::Error;
use crate::iodesc::ElemType;
use crate::pool::Handle;

/// `netCDF`'s `NC_FILL_*` constants, read off `MPI_Datatype` identity in
/// `original_source`; keyed here off the closed [`ElemType`] enum instead
/// (see DESIGN.md).
pub fn default_fill_bytes(elem_type: ElemType) -> Result<Vec<u8>, Error> {
    Ok(match elem_type {
        ElemType::I8 => (-127i8).to_ne_bytes().to_vec(),
        ElemType::U8 => 255u8.to_ne_bytes().to_vec(),
        ElemType::I16 => (-32767i16).to_ne_bytes().to_vec(),
        ElemType::U16 => 65535u16.to_ne_bytes().to_vec(),
        ElemType::I32 => (-2_147_483_647i32).to_ne_bytes().to_vec(),
        ElemType::U32 => 4_294_967_295u32.to_ne_bytes().to_vec(),
        ElemType::I64 => (-9_223_372_036_854_775_806i64).to_ne_bytes().to_vec(),
        ElemType::U64 => 18_446_744_073_709_551_614u64.to_ne_bytes().to_vec(),
        ElemType::F32 => 9.969_209_9e36_f32.to_ne_bytes().to_vec(),
        ElemType::F64 => 9.969_209_968_386_869e36_f64.to_ne_bytes().to_vec(),
    })
}

/// Key identifying a WMB within a file's WMB list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WmbKey {
    pub ioid: u64,
    pub recordvar: bool,
}

/// One buffered batch of variable payloads sharing a decomposition and
/// record-ness.
#[derive(Debug, Default)]
pub struct Wmb {
    pub ioid: u64,
    pub recordvar: bool,
    pub arraylen: usize,
    pub elem_size: usize,
    pub num_arrays: usize,
    pub data: Vec<u8>,
    pub vid: Vec<i32>,
    pub frame: Vec<i64>,
    pub fillvalue: Vec<u8>,
    /// The arena allocation backing `data`, if the caller is tracking pool
    /// pressure for the flush policy (§4.7). `None` until the driver's
    /// first `append` grows it.
    pub pool_handle: Option<Handle>,
}

impl Wmb {
    fn new(ioid: u64, recordvar: bool, arraylen: usize, elem_size: usize) -> Self {
        Wmb {
            ioid,
            recordvar,
            arraylen,
            elem_size,
            num_arrays: 0,
            data: Vec::new(),
            vid: Vec::new(),
            frame: Vec::new(),
            fillvalue: Vec::new(),
            pool_handle: None,
        }
    }

    /// Append one variable's payload. `fill` is the user-supplied fill
    /// value bytes, if any; when `needsfill` and no fill is supplied, the
    /// type's default (§4.6) is used.
    #[allow(clippy::too_many_arguments)]
    pub fn append(
        &mut self,
        varid: i32,
        frame: Option<i64>,
        array: &[u8],
        needsfill: bool,
        elem_type: ElemType,
        fill: Option<&[u8]>,
    ) -> Result<(), Error> {
        if array.len() != self.arraylen * self.elem_size {
            return Err(Error::BadArg("append: array length does not match arraylen"));
        }
        self.data
            .resize((self.num_arrays + 1) * self.arraylen * self.elem_size, 0);
        self.vid.push(varid);
        if self.recordvar {
            self.frame.push(frame.ok_or(Error::BadArg("recordvar WMB requires a frame"))?);
        }
        if needsfill {
            let bytes = match fill {
                Some(f) => f.to_vec(),
                None => default_fill_bytes(elem_type)?,
            };
            if bytes.len() != self.elem_size {
                return Err(Error::BadArg("fill value size mismatch"));
            }
            self.fillvalue.extend_from_slice(&bytes);
        }
        let dst_start = self.num_arrays * self.arraylen * self.elem_size;
        self.data[dst_start..dst_start + array.len()].copy_from_slice(array);
        self.num_arrays += 1;
        Ok(())
    }

    pub fn check_invariants(&self) -> bool {
        let len_ok = self.data.len() == self.num_arrays * self.arraylen * self.elem_size;
        let vid_ok = self.vid.len() == self.num_arrays;
        let frame_ok = !self.recordvar || self.frame.len() == self.num_arrays;
        len_ok && vid_ok && frame_ok
    }
}

/// The file's list of in-flight WMBs, keyed by `(ioid, recordvar)`.
#[derive(Default)]
pub struct WmbList {
    entries: Vec<Wmb>,
}

impl WmbList {
    pub fn new() -> Self {
        WmbList { entries: Vec::new() }
    }

    /// Find the WMB matching `key`, or create one sized for `arraylen`
    /// elements of `elem_size` bytes if none exists yet.
    pub fn find_or_create(
        &mut self,
        key: WmbKey,
        arraylen: usize,
        elem_size: usize,
    ) -> &mut Wmb {
        if let Some(idx) = self
            .entries
            .iter()
            .position(|w| w.ioid == key.ioid && w.recordvar == key.recordvar)
        {
            return &mut self.entries[idx];
        }
        self.entries
            .push(Wmb::new(key.ioid, key.recordvar, arraylen, elem_size));
        self.entries.last_mut().unwrap()
    }

    pub fn get(&self, key: WmbKey) -> Option<&Wmb> {
        self.entries
            .iter()
            .find(|w| w.ioid == key.ioid && w.recordvar == key.recordvar)
    }

    pub fn get_mut(&mut self, key: WmbKey) -> Option<&mut Wmb> {
        self.entries
            .iter_mut()
            .find(|w| w.ioid == key.ioid && w.recordvar == key.recordvar)
    }

    /// Remove and return the WMB matching `key`, if any (flush-to-completion
    /// or file-close lifecycle end, §3).
    pub fn take(&mut self, key: WmbKey) -> Option<Wmb> {
        let idx = self
            .entries
            .iter()
            .position(|w| w.ioid == key.ioid && w.recordvar == key.recordvar)?;
        Some(self.entries.remove(idx))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_grows_fields_in_order_and_preserves_invariants() {
        let mut list = WmbList::new();
        let key = WmbKey { ioid: 1, recordvar: false };
        let wmb = list.find_or_create(key, 4, 8);
        wmb.append(10, None, &0u64.to_ne_bytes().repeat(4), false, ElemType::F64, None)
            .unwrap();
        wmb.append(11, None, &1u64.to_ne_bytes().repeat(4), false, ElemType::F64, None)
            .unwrap();
        assert_eq!(wmb.num_arrays, 2);
        assert_eq!(wmb.vid, vec![10, 11]);
        assert!(wmb.check_invariants());
    }

    #[test]
    fn needsfill_uses_default_when_caller_supplies_none() {
        let mut list = WmbList::new();
        let key = WmbKey { ioid: 2, recordvar: false };
        let wmb = list.find_or_create(key, 1, 4);
        wmb.append(0, None, &0i32.to_ne_bytes(), true, ElemType::I32, None)
            .unwrap();
        assert_eq!(wmb.fillvalue, (-2_147_483_647i32).to_ne_bytes().to_vec());
    }

    #[test]
    fn recordvar_without_frame_is_bad_arg() {
        let mut list = WmbList::new();
        let key = WmbKey { ioid: 3, recordvar: true };
        let wmb = list.find_or_create(key, 1, 4);
        let err = wmb
            .append(0, None, &0i32.to_ne_bytes(), false, ElemType::I32, None)
            .unwrap_err();
        assert!(matches!(err, Error::BadArg(_)));
    }

    #[test]
    fn find_or_create_matches_on_ioid_and_recordvar() {
        let mut list = WmbList::new();
        let a = WmbKey { ioid: 1, recordvar: false };
        let b = WmbKey { ioid: 1, recordvar: true };
        list.find_or_create(a, 1, 4);
        list.find_or_create(b, 1, 4);
        assert!(list.get(a).is_some());
        assert!(list.get(b).is_some());
        assert_ne!(list.get(a).unwrap().recordvar, list.get(b).unwrap().recordvar);
    }
}
