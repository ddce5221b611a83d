#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AddressGrid {
    count: u32,
    side: u32,
}

const NEIGHBOR_OFFSETS: [(i64, i64); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

impl AddressGrid {
    pub fn new(count: u32) -> Self {
        Self {
            count,
            side: ceil_sqrt(count).max(1),
        }
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn side(&self) -> u32 {
        self.side
    }

    pub fn row(&self, id: u32) -> u32 {
        id / self.side
    }

    pub fn col(&self, id: u32) -> u32 {
        id % self.side
    }

    pub fn max_row(&self) -> u32 {
        self.row(self.count.saturating_sub(1))
    }

    pub fn id_at(&self, row: u32, col: u32) -> Option<u32> {
        if col >= self.side {
            return None;
        }
        let id = u64::from(row) * u64::from(self.side) + u64::from(col);
        (id < u64::from(self.count)).then_some(id as u32)
    }

    // Edges are skipped, not wrapped.
    pub fn for_each_neighbor<F>(&self, id: u32, mut callback: F)
    where
        F: FnMut(u32),
    {
        if id >= self.count {
            return;
        }

        let row = i64::from(self.row(id));
        let col = i64::from(self.col(id));
        for (dr, dc) in NEIGHBOR_OFFSETS {
            let (r, c) = (row + dr, col + dc);
            if r < 0 || c < 0 {
                continue;
            }
            if let Some(neighbor) = self.id_at(r as u32, c as u32) {
                callback(neighbor);
            }
        }
    }
}

pub(crate) fn ceil_sqrt(n: u32) -> u32 {
    let mut root = (n as f64).sqrt() as u32;
    while u64::from(root) * u64::from(root) < u64::from(n) {
        root += 1;
    }
    while root > 0 && u64::from(root - 1) * u64::from(root - 1) >= u64::from(n) {
        root -= 1;
    }
    root
}

pub(crate) fn ceil_cbrt(n: u32) -> u32 {
    let mut root = (n as f64).cbrt() as u32;
    let cube = |r: u32| u64::from(r).pow(3);
    while cube(root) < u64::from(n) {
        root += 1;
    }
    while root > 0 && cube(root - 1) >= u64::from(n) {
        root -= 1;
    }
    root
}
