/////////////////////////////////////////////
// A generic 2-dimensional array structure //
/////////////////////////////////////////////

use std::io::Error;
use std::io::ErrorKind;
use std::ops::{AddAssign, Index, IndexMut, SubAssign};

/// A simple in-memory 2-D grid that is not connected to a file. Out-of-grid
/// reads return the nodata value rather than panicking, so scan loops can
/// address cells beyond the grid edges freely.
///
/// Example:
///
/// ```ignore
/// let mut a: Array2D<f64> = Array2D::new(100, 500, 0f64, -999f64)?;
/// a.set_value(50, 100, 1f64);
/// let v = a.get_value(50, 100);
/// ```
#[derive(Clone, Debug)]
pub struct Array2D<T: Copy + AddAssign + SubAssign> {
    pub rows: isize,
    pub columns: isize,
    pub nodata: T,
    data: Vec<T>,
}

impl<T> Array2D<T>
where
    T: Copy + AddAssign + SubAssign,
{
    pub fn new(rows: isize, columns: isize, initial_value: T, nodata: T) -> Result<Array2D<T>, Error> {
        if rows < 0 || columns < 0 {
            return Err(Error::new(
                ErrorKind::InvalidData,
                "Only non-negative rows and columns values accepted.",
            ));
        }
        Ok(Array2D {
            rows,
            columns,
            nodata,
            data: vec![initial_value; (rows * columns) as usize],
        })
    }

    pub fn get_value(&self, row: isize, column: isize) -> T {
        if row < 0 || column < 0 || row >= self.rows || column >= self.columns {
            return self.nodata;
        }
        self.data[(row * self.columns + column) as usize]
    }

    pub fn set_value(&mut self, row: isize, column: isize, value: T) {
        if row >= 0 && column >= 0 && row < self.rows && column < self.columns {
            self.data[(row * self.columns + column) as usize] = value;
        }
    }

    pub fn increment(&mut self, row: isize, column: isize, value: T) {
        if row >= 0 && column >= 0 && row < self.rows && column < self.columns {
            self.data[(row * self.columns + column) as usize] += value;
        }
    }

    pub fn decrement(&mut self, row: isize, column: isize, value: T) {
        if row >= 0 && column >= 0 && row < self.rows && column < self.columns {
            self.data[(row * self.columns + column) as usize] -= value;
        }
    }

    pub fn get_row_data(&self, row: isize) -> Vec<T> {
        let columns = self.columns as usize;
        let mut values = vec![self.nodata; columns];
        if row >= 0 && row < self.rows {
            let start = row as usize * columns;
            values.copy_from_slice(&self.data[start..start + columns]);
        }
        values
    }

    pub fn set_row_data(&mut self, row: isize, values: Vec<T>) {
        if row < 0 || row >= self.rows {
            return;
        }
        for column in 0..values.len().min(self.columns as usize) {
            self.data[row as usize * self.columns as usize + column] = values[column];
        }
    }

    pub fn reinitialize_values(&mut self, value: T) {
        self.data = vec![value; (self.rows * self.columns) as usize];
    }

    pub fn duplicate(&self) -> Array2D<T> {
        self.clone()
    }

    pub fn rows(&self) -> isize {
        self.rows
    }

    pub fn columns(&self) -> isize {
        self.columns
    }

    pub fn nodata(&self) -> T {
        self.nodata
    }
}

impl<T> Index<(isize, isize)> for Array2D<T>
where
    T: Copy + AddAssign + SubAssign,
{
    type Output = T;

    fn index(&self, index: (isize, isize)) -> &T {
        let (row, column) = index;
        if row < 0 || column < 0 || row >= self.rows || column >= self.columns {
            return &self.nodata;
        }
        &self.data[(row * self.columns + column) as usize]
    }
}

impl<T> IndexMut<(isize, isize)> for Array2D<T>
where
    T: Copy + AddAssign + SubAssign,
{
    fn index_mut(&mut self, index: (isize, isize)) -> &mut T {
        let (row, column) = index;
        if row < 0 || column < 0 || row >= self.rows || column >= self.columns {
            return &mut self.nodata;
        }
        &mut self.data[(row * self.columns + column) as usize]
    }
}

#[cfg(test)]
mod test {
    use super::Array2D;

    #[test]
    fn test_out_of_grid_reads_return_nodata() {
        let a: Array2D<i32> = Array2D::new(3, 3, 0, -1).unwrap();
        assert_eq!(a.get_value(-1, 0), -1);
        assert_eq!(a.get_value(0, -1), -1);
        assert_eq!(a.get_value(3, 0), -1);
        assert_eq!(a[(0, 3)], -1);
    }

    #[test]
    fn test_row_data_round_trip() {
        let mut a: Array2D<f64> = Array2D::new(2, 4, 0f64, -999f64).unwrap();
        a.set_row_data(1, vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(a.get_row_data(1), vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(a.get_row_data(0), vec![0.0; 4]);
        a.increment(1, 0, 0.5);
        assert_eq!(a.get_value(1, 0), 1.5);
    }
}
