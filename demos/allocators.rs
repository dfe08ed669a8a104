use std::{error::Error, io, ptr};

use memkit::{Arena, DynArray, Pool, TrackedHeap, size::kib};
use tracing_subscriber::EnvFilter;

/// Prints capacity, count and contents of `arr` after `op`.
fn watch(
  name: &str,
  arr: &DynArray<i32>,
  op: &str,
) {
  println!("[{name}] after {op}");
  println!(
    "capacity: {} count: {} data: {:?}\n",
    arr.capacity(),
    arr.len(),
    arr.as_slice()
  );
}

fn array_demo() -> memkit::Result<()> {
  println!("-- array demo --");

  let mut arr1 = DynArray::new();
  watch("arr1", &arr1, "creation");

  arr1.push(-1)?;
  arr1.push(2)?;
  watch("arr1", &arr1, "push");

  arr1.insert(1, 0)?;
  arr1.insert(2, 1)?;
  watch("arr1", &arr1, "insert");

  arr1.reserve(9)?;
  watch("arr1", &arr1, "reserve");

  arr1.concat(&[3, 4, 5, 6, 7, 8])?;
  watch("arr1", &arr1, "concat");

  let mut arr2 = arr1.try_clone()?;
  watch("arr2", &arr2, "copy");
  arr2.free();

  arr1.pop();
  watch("arr1", &arr1, "pop");

  arr1.remove(0)?;
  watch("arr1", &arr1, "remove");

  arr1.clear();
  watch("arr1", &arr1, "clear");

  arr1.push(3)?;
  arr1.push(2)?;
  arr1.push(1)?;
  arr1.sort_by(|a, b| a.cmp(b));
  watch("arr1", &arr1, "sort");

  arr1.free();
  watch("arr1", &arr1, "free");

  Ok(())
}

fn arena_demo(buffer: &mut [u8]) -> memkit::Result<()> {
  println!("-- arena demo --");

  let mut arena = Arena::new(&mut buffer[..256]);

  for _ in 0..3 {
    // Reset all arena offsets for each loop
    arena.clear();

    let x = arena.alloc(size_of::<i32>())?.cast::<i32>();
    let f = arena.alloc(size_of::<f32>())?.cast::<f32>();
    let s = arena.alloc(10)?;

    unsafe {
      x.as_ptr().write(123);
      f.as_ptr().write(987.0);
      ptr::copy_nonoverlapping(b"Hellope".as_ptr(), s.as_ptr(), 7);

      println!("{:?}: {}", x, x.as_ptr().read());
      println!("{:?}: {}", f, f.as_ptr().read());

      let s = arena.resize(Some(s), 10, 16)?;
      ptr::copy_nonoverlapping(b" world!".as_ptr(), s.as_ptr().add(7), 7);
      let text = std::slice::from_raw_parts(s.as_ptr(), 14);
      println!("{:?}: {}", s, String::from_utf8_lossy(text));
    }
  }

  let before = arena.offset();
  {
    let mut scratch = arena.begin_temp();
    scratch.alloc(64)?;
    scratch.alloc(64)?;
    println!("scratch offset = {}", scratch.offset());
  }
  println!("offset before scratch = {before}, after = {}\n", arena.offset());

  Ok(())
}

fn pool_demo(buffer: &mut [u8]) -> memkit::Result<()> {
  println!("-- pool demo --");

  let mut pool = Pool::new(buffer, 64)?;

  let v: Vec<_> = (0..6).map(|_| pool.alloc()).collect::<Result<_, _>>()?;
  for (i, chunk) in v.iter().enumerate() {
    println!("v{i} = {chunk:?}");
  }

  for i in [5, 2, 1, 3] {
    pool.free(v[i].as_ptr())?;
  }
  println!("After freeing v5, v2, v1 and v3: {} chunks free", pool.free_count());

  let reused = pool.alloc()?;
  println!(
    "Next allocation = {reused:?} (v3 again: {})\n",
    reused == v[3]
  );

  Ok(())
}

fn tracker_demo() -> Result<(), Box<dyn Error>> {
  println!("-- tracked heap demo --");

  let mut heap = TrackedHeap::new();

  let a = heap.malloc(100)?;
  let b = heap.calloc(16, 8)?;
  let _page = heap.malloc(kib(4))?;

  unsafe {
    heap.free(b.as_ptr())?;
    heap.realloc(a.as_ptr(), 300)?;
  }

  heap.print_stats(&mut io::stdout().lock(), true)?;

  // The page and the reallocated block are still live; dropping the heap
  // reports and releases them.
  Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .init();

  let mut buffer = vec![0u8; kib(1)];

  array_demo()?;
  arena_demo(&mut buffer)?;
  pool_demo(&mut buffer)?;
  tracker_demo()?;

  Ok(())
}
